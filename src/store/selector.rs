//! Selector shapes and the normalization/merge math every Value-holding
//! backend needs to apply them, grounded on `frid/kvs/basic.py` and
//! `frid/kvs/utils.py`'s index/range/stride helpers.

use crate::value::{Mapping, Value};

/// A sub-value selector: either an array selector or a map selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Sel {
    /// A single array index (negative counts from the end).
    Index(i64),
    /// A half-open `[lo, hi)` range (negative bounds count from the end;
    /// `hi <= 0` is treated as `len + hi`).
    Range(i64, i64),
    /// A Python-style `start:stop:step` stride slice.
    Slice { start: Option<i64>, stop: Option<i64>, step: i64 },
    /// A single map key.
    Key(String),
    /// A set of map keys.
    KeySet(Vec<String>),
}

/// Clamps a possibly-negative, possibly-out-of-range index into `[0, len]`.
fn clamp_index(i: i64, len: usize) -> usize {
    let len_i = len as i64;
    let resolved = if i < 0 { len_i + i } else { i };
    resolved.clamp(0, len_i) as usize
}

/// Resolves a single index to `Some(position)` iff `0 <= position < len`
/// once negative indices are counted from the end.
fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let resolved = if i < 0 { len_i + i } else { i };
    if resolved >= 0 && resolved < len_i {
        Some(resolved as usize)
    } else {
        None
    }
}

/// Resolves a `(lo, hi)` range to clamped, order-correct `[start, end)`
/// byte/element positions. `hi <= 0` is shorthand for `len + hi`.
fn resolve_range(lo: i64, hi: i64, len: usize) -> (usize, usize) {
    let hi = if hi <= 0 { hi + len as i64 } else { hi };
    let start = clamp_index(lo, len);
    let end = clamp_index(hi, len).max(start);
    (start, end)
}

/// Resolves a stride slice to the concrete list of positions it selects,
/// following the usual negative-step-reverses-direction convention.
fn resolve_slice(start: Option<i64>, stop: Option<i64>, step: i64, len: usize) -> Vec<usize> {
    if step == 0 {
        return Vec::new();
    }
    let len_i = len as i64;
    let (default_start, default_stop) = if step > 0 { (0, len_i) } else { (len_i - 1, -1) };
    let norm = |v: i64| -> i64 {
        let v = if v < 0 { v + len_i } else { v };
        v.clamp(if step > 0 { 0 } else { -1 }, len_i)
    };
    let mut cur = start.map(norm).unwrap_or(default_start);
    let stop_resolved = stop.map(norm).unwrap_or(default_stop);
    let mut out = Vec::new();
    if step > 0 {
        while cur < stop_resolved {
            if cur >= 0 && cur < len_i {
                out.push(cur as usize);
            }
            cur += step;
        }
    } else {
        while cur > stop_resolved {
            if cur >= 0 && cur < len_i {
                out.push(cur as usize);
            }
            cur += step;
        }
    }
    out
}

/// Applies a read selector to an array, returning the selected sub-value
/// (a single element for [`Sel::Index`], a sub-array otherwise).
pub fn get_array(items: &[Value], sel: &Sel) -> Option<Value> {
    match sel {
        Sel::Index(i) => resolve_index(*i, items.len()).map(|p| items[p].clone()),
        Sel::Range(lo, hi) => {
            let (start, end) = resolve_range(*lo, *hi, items.len());
            Some(Value::Array(items[start..end].to_vec()))
        }
        Sel::Slice { start, stop, step } => {
            let positions = resolve_slice(*start, *stop, *step, items.len());
            Some(Value::Array(positions.into_iter().map(|p| items[p].clone()).collect()))
        }
        Sel::Key(_) | Sel::KeySet(_) => None,
    }
}

/// Removes the elements `sel` selects from `items` in place, returning how
/// many were removed.
pub fn del_array(items: &mut Vec<Value>, sel: &Sel) -> usize {
    match sel {
        Sel::Index(i) => match resolve_index(*i, items.len()) {
            Some(p) => {
                items.remove(p);
                1
            }
            None => 0,
        },
        Sel::Range(lo, hi) => {
            let (start, end) = resolve_range(*lo, *hi, items.len());
            items.drain(start..end).count()
        }
        Sel::Slice { start, stop, step } => {
            let mut positions = resolve_slice(*start, *stop, *step, items.len());
            positions.sort_unstable();
            positions.dedup();
            for &p in positions.iter().rev() {
                items.remove(p);
            }
            positions.len()
        }
        Sel::Key(_) | Sel::KeySet(_) => 0,
    }
}

/// Applies a read selector to a map: `Key` returns the value or `None`,
/// `KeySet` returns a sub-map of whichever keys are present.
pub fn get_map(map: &Mapping, sel: &Sel) -> Option<Value> {
    match sel {
        Sel::Key(k) => map.get(k).cloned(),
        Sel::KeySet(keys) => {
            let mut sub = Mapping::new();
            for k in keys {
                if let Some(v) = map.get(k) {
                    sub.insert(k.clone(), v.clone());
                }
            }
            Some(Value::Mapping(sub))
        }
        Sel::Index(_) | Sel::Range(..) | Sel::Slice { .. } => None,
    }
}

/// Removes the keys `sel` selects from `map`, returning how many existed.
pub fn del_map(map: &mut Mapping, sel: &Sel) -> usize {
    match sel {
        Sel::Key(k) => map.remove(k).map(|_| 1).unwrap_or(0),
        Sel::KeySet(keys) => keys.iter().filter(|k| map.remove(k).is_some()).count(),
        Sel::Index(_) | Sel::Range(..) | Sel::Slice { .. } => 0,
    }
}

/// `KEEP_BOTH` merge: maps union with the new value winning on key
/// conflicts, arrays concatenate, anything else is replaced outright.
/// Deterministic and idempotent when applied twice with the same `new`.
pub fn merge_keep_both(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Mapping(mut old_map), Value::Mapping(new_map)) => {
            for (k, v) in new_map {
                old_map.insert(k, v);
            }
            Value::Mapping(old_map)
        }
        (Value::Array(mut old_items), Value::Array(new_items)) => {
            old_items.extend(new_items);
            Value::Array(old_items)
        }
        (_, new) => new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_selects_with_negative_wraparound() {
        let items = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        assert_eq!(get_array(&items, &Sel::Index(-1)), Some(Value::Int(3)));
        assert_eq!(get_array(&items, &Sel::Index(5)), None);
    }

    #[test]
    fn range_clamps_and_handles_non_positive_hi() {
        let items = vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)];
        assert_eq!(get_array(&items, &Sel::Range(1, 0)), Some(Value::Array(vec![Value::Int(2), Value::Int(3), Value::Int(4)])));
        assert_eq!(get_array(&items, &Sel::Range(3, 1)), Some(Value::Array(vec![])));
    }

    #[test]
    fn slice_supports_negative_step() {
        let items = vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)];
        let sel = Sel::Slice { start: None, stop: None, step: -1 };
        assert_eq!(get_array(&items, &sel), Some(Value::Array(vec![Value::Int(4), Value::Int(3), Value::Int(2), Value::Int(1)])));
    }

    #[test]
    fn del_array_range_shifts_remaining() {
        let mut items = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
        let removed = del_array(&mut items, &Sel::Range(0, 2));
        assert_eq!(removed, 2);
        assert_eq!(items, vec![Value::Int(3)]);
    }

    #[test]
    fn keyset_returns_only_present_keys() {
        let map = crate::value::mapping_from([("a", Value::Int(1)), ("b", Value::Int(2))]);
        let got = get_map(&map, &Sel::KeySet(vec!["a".to_string(), "missing".to_string()])).unwrap();
        assert_eq!(got, Value::Mapping(crate::value::mapping_from([("a", Value::Int(1))])));
    }

    #[test]
    fn merge_keep_both_is_idempotent() {
        let old = Value::Mapping(crate::value::mapping_from([("a", Value::Int(1))]));
        let new = Value::Mapping(crate::value::mapping_from([("b", Value::Int(2))]));
        let once = merge_keep_both(old.clone(), new.clone());
        let twice = merge_keep_both(once.clone(), new);
        assert_eq!(once, twice);
    }
}
