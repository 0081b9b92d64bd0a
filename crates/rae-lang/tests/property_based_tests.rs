//! Property-based tests for rae-lang values, state and the interpreter.
use proptest::prelude::*;
use rae_lang::{
    BinaryOp, Env, EvalError, Interpreter, Node, Number, Options, Outcome, Shared, StateStore,
    StateVariables, Value,
};
use smallvec::SmallVec;

mod strategies {
    use super::*;

    /// Generates identifiers for locals and state variables
    pub fn ident() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,10}"
    }

    /// Generates object atoms
    pub fn atom() -> impl Strategy<Value = Value> {
        "[a-z][a-z0-9]{0,4}".prop_map(Value::from)
    }

    /// Generates numeric values (with reasonable bounds)
    pub fn number() -> impl Strategy<Value = Value> {
        prop_oneof![
            (-1_000_000i64..=1_000_000).prop_map(Value::from),
            (-1000.0f64..1000.0f64).prop_map(Value::from),
        ]
    }

    /// Generates any non-NaN value
    pub fn value() -> impl Strategy<Value = Value> {
        prop_oneof![
            4 => number(),
            4 => atom(),
            2 => any::<bool>().prop_map(Value::from),
            1 => Just(Value::None),
        ]
    }

    /// Generates argument tuples for state variables
    pub fn args() -> impl Strategy<Value = Vec<Value>> {
        prop::collection::vec(value(), 0..=3)
    }
}

fn finished(node: Shared<Node>, state: &mut StateVariables) -> Result<Value, EvalError> {
    match rae_lang::evaluate(&node, Env::new(), state)? {
        (Outcome::Finished(value), _) => Ok(value),
        (Outcome::Suspended(dp), _) => panic!("unexpected suspension at {}", dp),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Integer arithmetic stays integral
    #[test]
    fn int_add_sub_mul_stay_int(a in -1_000_000i64..=1_000_000, b in -1_000_000i64..=1_000_000) {
        prop_assert_eq!(Value::from(a).binary(BinaryOp::Add, &Value::from(b)), Ok(Value::from(a + b)));
        prop_assert_eq!(Value::from(a).binary(BinaryOp::Sub, &Value::from(b)), Ok(Value::from(a - b)));
        prop_assert_eq!(Value::from(a).binary(BinaryOp::Mul, &Value::from(b)), Ok(Value::from(a * b)));
    }

    /// Integer division rounds toward negative infinity
    #[test]
    fn int_division_floors(a in -10_000i64..=10_000, b in prop_oneof![-100i64..=-1, 1i64..=100]) {
        let result = Value::from(a).binary(BinaryOp::Div, &Value::from(b)).unwrap();
        prop_assert_eq!(result.type_name(), "int");
        prop_assert_eq!(result, Value::from((a as f64 / b as f64).floor() as i64));
    }

    /// Any float operand produces a float
    #[test]
    fn mixed_arithmetic_is_float(a in -1000i64..=1000, b in 0.5f64..100.0) {
        for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div] {
            let result = Value::from(a).binary(op, &Value::from(b)).unwrap();
            prop_assert!(matches!(result, Value::Number(Number::Float(_))));
        }
    }

    /// Equality is reflexive and symmetric
    #[test]
    fn equality_is_reflexive_and_symmetric(a in strategies::value(), b in strategies::value()) {
        prop_assert_eq!(a.binary(BinaryOp::Equals, &a), Ok(Value::TRUE));
        match (a.binary(BinaryOp::Equals, &b), b.binary(BinaryOp::Equals, &a)) {
            (Ok(x), Ok(y)) => prop_assert_eq!(x, y),
            (Err(_), Err(_)) => {}
            (x, y) => prop_assert!(false, "asymmetric equality: {:?} vs {:?}", x, y),
        }
    }

    /// Arithmetic on strings is always a type mismatch
    #[test]
    fn string_arithmetic_is_type_mismatch(a in strategies::atom(), b in strategies::value()) {
        let result = a.binary(BinaryOp::Add, &b);
        prop_assert!(matches!(result, Err(EvalError::TypeMismatch { .. })), "got {:?}", result);
    }

    /// Writing a local variable then reading it returns the written value
    #[test]
    fn local_write_read_roundtrip(name in strategies::ident(), value in strategies::value()) {
        let mut state = StateVariables::new();
        let node = Node::seq([
            Node::assign(name.as_str(), Node::literal(value.clone())),
            Node::local(name.as_str()),
        ]);
        prop_assert_eq!(finished(node, &mut state), Ok(value));
    }

    /// Writing a state tuple then reading it returns the written value
    #[test]
    fn state_write_read_roundtrip(
        name in strategies::ident(),
        args in strategies::args(),
        value in strategies::value(),
    ) {
        let mut state = StateVariables::new();
        let arg_exprs = || args.iter().cloned().map(Node::literal).collect::<Vec<_>>();
        let node = Node::seq([
            Node::set_state(name.as_str(), arg_exprs(), Node::literal(value.clone())),
            Node::call(name.as_str(), arg_exprs()),
        ]);
        prop_assert_eq!(finished(node, &mut state), Ok(value.clone()));
        prop_assert_eq!(state.read(&name.as_str().into(), &args), Ok(value));
    }

    /// Reading an unwritten tuple is an error, never a default
    #[test]
    fn unwritten_state_tuple_is_not_found(name in strategies::ident(), args in strategies::args()) {
        let mut state = StateVariables::new();
        state.set(name.as_str(), [Value::from("written")], Value::TRUE);
        prop_assume!(args != vec![Value::from("written")]);
        let key: SmallVec<[Value; 4]> = args.iter().cloned().collect();
        prop_assert_eq!(
            state.read(&name.as_str().into(), &args),
            Err(EvalError::StateVariableNotFound { name: name.as_str().into(), key })
        );
    }

    /// A counting loop runs its body exactly as many times as its condition holds
    #[test]
    fn while_runs_body_exactly_n_times(n in 0i64..50) {
        let mut state = StateVariables::new();
        state.set("i", Vec::<Value>::new(), 0);
        let i = || Node::call("i", vec![]);
        let node = Node::while_loop(
            Node::binary(BinaryOp::Lt, i(), Node::literal(n)),
            Node::set_state("i", vec![], Node::binary(BinaryOp::Add, i(), Node::literal(1))),
        );
        let mut run = Interpreter::new(node, Env::new(), Options { max_loop_iterations: Some(100), ..Default::default() });
        prop_assert_eq!(run.step(&mut state), Ok(Outcome::Finished(Value::NONE)));
        prop_assert_eq!(state.get("i", &[]), Some(&Value::from(n)));
    }

    /// A sequence of commands suspends once per command, in order
    #[test]
    fn commands_suspend_in_order(names in prop::collection::vec(strategies::ident(), 1..8)) {
        let mut state = StateVariables::new();
        let body = Node::seq(names.iter().map(|name| Node::command(name.as_str(), vec![])));
        let mut run = Interpreter::new(body, Env::new(), Options::default());
        let mut seen = Vec::new();
        loop {
            match run.step(&mut state).unwrap() {
                Outcome::Suspended(dp) => {
                    seen.push(dp.invocation().name.to_string());
                    run.resume(Value::TRUE).unwrap();
                }
                Outcome::Finished(_) => break,
            }
        }
        prop_assert_eq!(seen, names);
    }
}
