use lazyval::{Marker, PString, Record, Session, Thunk, Value, ValueError, ValueResult, extract};
use lazyval::extract::Extracted;

fn ctx(s: &PString) -> Vec<String> {
    s.markers().map(|m| m.to_string()).collect()
}

fn with(text: &str, markers: &[&str]) -> PString {
    PString::with_context(text, markers.iter().map(|m| Marker::from(*m)))
}

#[test]
fn literals_carry_no_context() {
    let s = PString::literal("ab").concat(&PString::literal("cd"));
    assert_eq!(s.as_str(), "abcd");
    assert!(s.context().is_empty());
}

#[test]
fn concat_is_exact_union() {
    let a = with("x", &["c", "a"]);
    let b = with("y", &["b", "c", "d"]);
    let ab = a.concat(&b);
    assert_eq!(ab.as_str(), "xy");
    assert_eq!(ctx(&ab), vec!["a", "b", "c", "d"]);
    assert_eq!(ab.context(), b.concat(&a).context());
}

#[test]
fn no_context_side_is_neutral() {
    let a = with("x", &["m"]);
    let plain = PString::literal("");
    assert_eq!(ctx(&plain.concat(&a)), vec!["m"]);
    assert_eq!(ctx(&a.concat(&plain)), vec!["m"]);
}

#[test]
fn substring_policy() {
    let s = with("abcdef", &["m"]);
    assert_eq!(s.substring(2, 2).unwrap().as_str(), "cd");
    assert_eq!(s.substring(4, 10).unwrap().as_str(), "ef");
    assert_eq!(ctx(&s.substring(4, 10).unwrap()), vec!["m"]);
    assert_eq!(s.substring(6, 1).unwrap().as_str(), "");
    assert!(matches!(
        s.substring(-2, 1),
        Err(ValueError::IndexOutOfRange { index: -2, .. })
    ));
}

#[test]
fn context_operations() {
    let s = with("text", &["b"]);
    let more = s.append_context([Marker::from("a"), Marker::from("b")]);
    assert_eq!(ctx(&more), vec!["a", "b"]);
    assert!(!more.discard_context().has_context());
    assert_eq!(more, s);
}

#[test]
fn interpolation_routes_record_coercion_through_union() {
    let session = Session::default();
    let out = session.intern("out");
    let record = Record::from_bindings([(
        out,
        Thunk::ready(Value::String(with("/built", &["artifact"]))),
    )])
    .unwrap();

    let hook = move |r: &Record| -> ValueResult<PString> {
        let value = r.get(out)?.ok_or_else(|| ValueError::thrown("no `out`"))?;
        Ok(value.as_string()?.clone())
    };

    let parts = vec![
        Thunk::ready(Value::String(with("cp ", &["tool"]))),
        Thunk::ready(Value::Record(record)),
        Thunk::new(|| Ok(Value::from(" ."))),
    ];
    let s = PString::interpolate(&parts, &hook).unwrap();
    assert_eq!(s.as_str(), "cp /built .");
    assert_eq!(ctx(&s), vec!["artifact", "tool"]);

    let bad = vec![Thunk::ready(Value::Bool(true))];
    assert!(PString::interpolate(&bad, &hook).unwrap_err().is_type_mismatch());
}

#[test]
fn extraction_enumerates_markers() {
    let session = Session::default();
    let value = Value::String(with("out", &["z", "y"]));
    assert_eq!(
        extract(&value, &session).unwrap(),
        Extracted::String {
            content: "out".to_string(),
            context: vec!["y".to_string(), "z".to_string()],
        }
    );
}
