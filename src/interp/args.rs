//=====================================================
// File: interp/args.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Argument receipt helpers for the RECV_* instructions
// Objective: Map caller-supplied positional arguments onto pre, optional,
//            rest and post parameters without ever indexing out of range
//=====================================================

use crate::ir::Signature;
use crate::runtime::Value;

/// Arity error message, or `None` when `given` fits `signature`.
pub(crate) fn arity_error(signature: &Signature, given: usize) -> Option<String> {
    (!signature.accepts(given))
        .then(|| format!("wrong number of arguments (given {given}, expected {signature})"))
}

pub(crate) fn pre_reqd(args: &[Value], index: u32) -> Value {
    args.get(index as usize).cloned().unwrap_or(Value::Nil)
}

/// Optional parameter `index`, or `Undefined` when the caller left it out.
pub(crate) fn opt(args: &[Value], index: u32, pre: u32, post: u32) -> Value {
    let (index, pre, post) = (index as usize, pre as usize, post as usize);
    if args.len() > pre + post + index {
        args.get(pre + index).cloned().unwrap_or(Value::Undefined)
    } else {
        Value::Undefined
    }
}

pub(crate) fn rest(args: &[Value], pre: u32, opt: u32, post: u32) -> Value {
    let n = args.len();
    let start = ((pre + opt) as usize).min(n);
    let end = n.saturating_sub(post as usize).max(start);
    Value::array(args[start..end].to_vec())
}

/// Post-required parameter `index`. Short argument lists fill from the
/// left and leave the tail nil.
pub(crate) fn post_reqd(
    args: &[Value],
    index: u32,
    pre: u32,
    opt: u32,
    post: u32,
    has_rest: bool,
) -> Value {
    let n = args.len();
    let (index, pre, opt, post) = (index as usize, pre as usize, opt as usize, post as usize);
    let position = if n <= pre + post {
        pre + index
    } else if has_rest {
        n - post + index
    } else {
        n.min(pre + opt + post) - post + index
    };
    args.get(position).cloned().unwrap_or(Value::Nil)
}

/// Proc argument shaping: a lone array argument is spread across a block
/// that takes more than one positional parameter.
pub(crate) fn splat_block_args(signature: &Signature, args: Vec<Value>) -> Vec<Value> {
    if args.len() == 1 && signature.positional_count() > 1 {
        if let Value::Array(items) = &args[0] {
            return items.borrow().clone();
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    #[test]
    fn missing_arguments_are_nil_or_undefined() {
        let args = ints(&[1]);
        assert_eq!(pre_reqd(&args, 0), Value::Integer(1));
        assert_eq!(pre_reqd(&args, 3), Value::Nil);
        assert_eq!(opt(&args, 0, 1, 0), Value::Undefined);
    }

    #[test]
    fn optional_and_post_share_the_middle() {
        // def m(a, b = 1, c = 2, d)
        let (pre, optional, post) = (1, 2, 1);
        let three = ints(&[10, 20, 30]);
        assert_eq!(opt(&three, 0, pre, post), Value::Integer(20));
        assert_eq!(opt(&three, 1, pre, post), Value::Undefined);
        assert_eq!(post_reqd(&three, 0, pre, optional, post, false), Value::Integer(30));

        let four = ints(&[10, 20, 30, 40]);
        assert_eq!(opt(&four, 1, pre, post), Value::Integer(30));
        assert_eq!(post_reqd(&four, 0, pre, optional, post, false), Value::Integer(40));

        let one = ints(&[10]);
        assert_eq!(post_reqd(&one, 0, pre, optional, post, false), Value::Nil);
    }

    #[test]
    fn rest_takes_what_is_left() {
        // def m(a, *rest, z)
        let args = ints(&[1, 2, 3, 4]);
        assert_eq!(rest(&args, 1, 0, 1), Value::array(ints(&[2, 3])));
        assert_eq!(post_reqd(&args, 0, 1, 0, 1, true), Value::Integer(4));
        assert_eq!(rest(&ints(&[1]), 1, 0, 1), Value::array(Vec::new()));
    }

    #[test]
    fn arity_messages_report_the_range() {
        let signature = Signature {
            pre: 1,
            opt: 1,
            ..Signature::NONE
        };
        assert_eq!(
            arity_error(&signature, 3).as_deref(),
            Some("wrong number of arguments (given 3, expected 1..2)")
        );
        assert!(arity_error(&signature, 2).is_none());
    }

    #[test]
    fn lone_arrays_are_spread_for_multi_parameter_blocks() {
        let pair = Signature::required(2);
        let spread = splat_block_args(&pair, vec![Value::array(ints(&[1, 2]))]);
        assert_eq!(spread, ints(&[1, 2]));
        let single = splat_block_args(&Signature::required(1), vec![Value::array(ints(&[1, 2]))]);
        assert_eq!(single.len(), 1);
    }
}
