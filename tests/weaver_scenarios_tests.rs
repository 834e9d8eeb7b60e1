//! Integration tests: advice dispatch through an in-memory function table
//!
//! Each scenario registers advice on a FunctionTable-backed weaver and
//! observes what the caller and the original implementation see.

use patchweave::{advice, Exception, FunctionTable, StatusFilter, Weaver, WeaverError};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared event log, written by originals and advice
#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

fn setup(log: &Log) -> (Rc<FunctionTable>, Weaver) {
    init_tracing();
    let table = Rc::new(FunctionTable::new());

    let greet_log = log.clone();
    table
        .define_function("greet", move |_, inv| {
            greet_log.push(format!("greet{:?}", inv.args));
            let name = inv.args.first().and_then(Value::as_str).unwrap_or("nobody");
            Ok(json!(format!("Hello, {}", name)))
        })
        .unwrap();

    table
        .define_method("Calculator", "add", |_, inv| {
            let sum: i64 = inv.args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        })
        .unwrap();

    table
        .define_function("risky", |_, inv| {
            if inv.args.first() == Some(&json!("fail")) {
                Err(Exception::new("RuntimeError", "risky failed").into())
            } else {
                Ok(json!(42))
            }
        })
        .unwrap();

    let weaver = Weaver::new(table.clone());
    (table, weaver)
}

#[test]
fn test_before_advice_rewrites_arguments() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_before(
            "greet",
            advice::from_fn(|jp| {
                jp.set_args(vec![json!("Ada")]);
                Ok(())
            }),
        )
        .unwrap();

    let value = table.call("greet", vec![json!("ignored")]).unwrap();
    assert_eq!(value, json!("Hello, Ada"));
    assert_eq!(log.entries(), vec![r#"greet[String("Ada")]"#]);
}

#[test]
fn test_before_advice_runs_once_before_original() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    let advice_log = log.clone();
    weaver
        .add_before(
            "greet",
            advice::from_fn(move |jp| {
                advice_log.push(format!("advice:{}", jp.kind()));
                Ok(())
            }),
        )
        .unwrap();

    let value = table.call("greet", vec![json!("Bob")]).unwrap();
    assert_eq!(value, json!("Hello, Bob"));
    assert_eq!(
        log.entries(),
        vec![
            "advice:before_function".to_string(),
            r#"greet[String("Bob")]"#.to_string()
        ]
    );
}

#[test]
fn test_after_advice_doubles_method_result() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_after(
            "Calculator::add",
            advice::from_fn(|jp| {
                jp.with_return_value_mut(|value| *value = json!(value.as_i64().unwrap_or(0) * 2));
                Ok(())
            }),
        )
        .unwrap();

    let calculator = json!({"precision": 0});
    let value = table
        .call_method("Calculator::add", calculator, vec![json!(2), json!(3)])
        .unwrap();
    assert_eq!(value, json!(10));
}

#[test]
fn test_after_advice_sees_completed_original_and_call_stack() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    weaver
        .add_after(
            "Calculator::add",
            advice::from_fn(move |jp| {
                sink.borrow_mut().push(json!({
                    "kind": jp.kind().to_string(),
                    "pointcut": jp.pointcut().as_str(),
                    "return": jp.return_value(),
                    "class": jp.class_name(),
                    "method": jp.method_name(),
                    "object": jp.object(),
                }));
                Ok(())
            }),
        )
        .unwrap();

    table
        .call_method("Calculator::add", json!({"id": 1}), vec![json!(4), json!(5)])
        .unwrap();

    assert_eq!(
        seen.borrow()[0],
        json!({
            "kind": "after_method",
            "pointcut": "Calculator::add",
            "return": 9,
            "class": "Calculator",
            "method": "add",
            "object": {"id": 1},
        })
    );
}

#[test]
fn test_after_return_behaves_like_after() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_after_return(
            "greet",
            advice::from_fn(|jp| {
                let greeting = jp.return_value();
                jp.set_return_value(json!(format!("{}!", greeting.as_str().unwrap_or(""))));
                Ok(())
            }),
        )
        .unwrap();

    assert_eq!(
        table.call("greet", vec![json!("Ada")]).unwrap(),
        json!("Hello, Ada!")
    );
}

#[test]
fn test_after_throw_rewrites_result_only_on_raise() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    let advice_log = log.clone();
    let handle = weaver
        .add_after_throw(
            "risky",
            advice::from_fn(move |jp| {
                let exception = jp.exception().expect("after-throw advice sees the exception");
                advice_log.push(format!("caught {}", exception));
                jp.set_return_value(json!(-1));
                Ok(())
            }),
        )
        .unwrap();

    assert_eq!(table.call("risky", vec![json!("fail")]).unwrap(), json!(-1));
    assert_eq!(log.entries(), vec!["caught RuntimeError: risky failed"]);

    assert_eq!(table.call("risky", vec![json!("ok")]).unwrap(), json!(42));
    assert_eq!(log.entries().len(), 1);
    assert_eq!(weaver.call_state(handle).unwrap().exception, None);
}

#[test]
fn test_after_throw_advice_can_reraise() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_after_throw(
            "risky",
            advice::from_fn(|jp| match jp.exception() {
                Some(exception) => Err(WeaverError::Raised(exception)),
                None => Ok(()),
            }),
        )
        .unwrap();

    let err = table.call("risky", vec![json!("fail")]).unwrap_err();
    assert_eq!(err.as_exception().unwrap().class, "RuntimeError");
}

#[test]
fn test_exception_propagates_through_after_advice() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    let fired = Rc::new(RefCell::new(false));
    let flag = fired.clone();
    let handle = weaver
        .add_after(
            "risky",
            advice::from_fn(move |_| {
                *flag.borrow_mut() = true;
                Ok(())
            }),
        )
        .unwrap();

    let err = table.call("risky", vec![json!("fail")]).unwrap_err();
    assert_eq!(err.to_string(), "RuntimeError: risky failed");
    assert!(!*fired.borrow());

    // The recursion guard restored interception on the error path
    assert!(weaver.is_enabled(handle).unwrap());
    assert_eq!(table.patch_count("risky"), 1);
}

#[test]
fn test_unsupported_capabilities_fail_inside_advice() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_before("greet", advice::from_fn(|jp| jp.proceed().map(|_| ())))
        .unwrap();
    let err = table.call("greet", vec![]).unwrap_err();
    assert_eq!(
        err,
        WeaverError::Kind {
            capability: "proceed".into(),
            kind: "around".into()
        }
    );

    weaver
        .add_after("Calculator::add", advice::from_fn(|jp| jp.property_value().map(|_| ())))
        .unwrap();
    let err = table
        .call_method("Calculator::add", json!({}), vec![json!(1)])
        .unwrap_err();
    assert!(err.to_string().contains("`property_value`"));
}

#[test]
fn test_recursive_original_bypasses_its_own_binding() {
    init_tracing();
    let table = Rc::new(FunctionTable::new());
    table
        .define_function("factorial", |table, inv| {
            let n = inv.args.first().and_then(Value::as_i64).unwrap_or(0);
            if n <= 1 {
                return Ok(json!(1));
            }
            let rest = table.call("factorial", vec![json!(n - 1)])?;
            Ok(json!(n * rest.as_i64().unwrap_or(0)))
        })
        .unwrap();
    let weaver = Weaver::new(table.clone());

    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let handle = weaver
        .add_before(
            "factorial",
            advice::from_fn(move |_| {
                *counter.borrow_mut() += 1;
                Ok(())
            }),
        )
        .unwrap();

    assert_eq!(table.call("factorial", vec![json!(5)]).unwrap(), json!(120));
    assert_eq!(*calls.borrow(), 1);
    assert!(weaver.is_enabled(handle).unwrap());

    assert_eq!(table.call("factorial", vec![json!(3)]).unwrap(), json!(6));
    assert_eq!(*calls.borrow(), 2);
}

#[test]
fn test_nested_selector_dispatches_through_its_own_binding() {
    let log = Log::default();
    let (table, weaver) = setup(&log);
    table
        .define_function("welcome", |table, inv| {
            let greeting = table.call("greet", inv.args.clone())?;
            Ok(json!(format!("{} and welcome", greeting.as_str().unwrap_or(""))))
        })
        .unwrap();

    let outer_log = log.clone();
    weaver
        .add_before(
            "welcome",
            advice::from_fn(move |_| {
                outer_log.push("advice:welcome");
                Ok(())
            }),
        )
        .unwrap();
    weaver
        .add_before(
            "greet",
            advice::from_fn(|jp| {
                jp.set_args(vec![json!("Grace")]);
                Ok(())
            }),
        )
        .unwrap();

    let value = table.call("welcome", vec![json!("Ada")]).unwrap();
    assert_eq!(value, json!("Hello, Grace and welcome"));
    assert_eq!(
        log.entries(),
        vec![
            "advice:welcome".to_string(),
            r#"greet[String("Grace")]"#.to_string()
        ]
    );
}

#[test]
fn test_advice_can_disable_its_own_binding() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    let registry = weaver.clone();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    weaver
        .add_before(
            "greet",
            advice::from_fn(move |jp| {
                *counter.borrow_mut() += 1;
                registry.disable(jp.pointcut())?;
                Ok(())
            }),
        )
        .unwrap();

    table.call("greet", vec![json!("Ada")]).unwrap();
    table.call("greet", vec![json!("Ada")]).unwrap();

    assert_eq!(*calls.borrow(), 1);
    assert_eq!(weaver.is_selector_enabled("greet"), Some(false));
}

#[test]
fn test_find_handles_after_disabling_one_of_two() {
    let log = Log::default();
    let (_table, weaver) = setup(&log);

    let first = weaver.add_before("greet", advice::from_fn(|_| Ok(()))).unwrap();
    let second = weaver.add_after("greet", advice::from_fn(|_| Ok(()))).unwrap();
    weaver.disable(first).unwrap();

    assert_eq!(
        weaver.find_handles("greet", StatusFilter::Enabled),
        vec![second]
    );
}

#[test]
fn test_stacked_before_bindings_each_fire_newest_first() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    for label in ["first", "second"] {
        let advice_log = log.clone();
        weaver
            .add_before(
                "greet",
                advice::from_fn(move |_| {
                    advice_log.push(label);
                    Ok(())
                }),
            )
            .unwrap();
    }

    let expected = vec![
        "second".to_string(),
        "first".to_string(),
        r#"greet[String("Ada")]"#.to_string(),
    ];
    assert_eq!(table.call("greet", vec![json!("Ada")]).unwrap(), json!("Hello, Ada"));
    assert_eq!(log.entries(), expected);

    // Both replacements are back, in the same order
    assert_eq!(table.patch_count("greet"), 2);
    table.call("greet", vec![json!("Ada")]).unwrap();
    assert_eq!(log.entries()[3..], expected[..]);
}

#[test]
fn test_stacked_after_bindings_compose_return_values() {
    let log = Log::default();
    let (table, weaver) = setup(&log);

    weaver
        .add_after(
            "Calculator::add",
            advice::from_fn(|jp| {
                jp.with_return_value_mut(|value| *value = json!(value.as_i64().unwrap_or(0) * 2));
                Ok(())
            }),
        )
        .unwrap();
    weaver
        .add_after(
            "Calculator::add",
            advice::from_fn(|jp| {
                jp.with_return_value_mut(|value| *value = json!(value.as_i64().unwrap_or(0) + 1));
                Ok(())
            }),
        )
        .unwrap();

    // Older binding doubles first, newer one adds one to what it sees
    let value = table
        .call_method("Calculator::add", json!({}), vec![json!(2), json!(3)])
        .unwrap();
    assert_eq!(value, json!(11));
}
