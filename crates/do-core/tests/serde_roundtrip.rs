use do_core::{Column, Frame, VariableType};

#[test]
fn frame_roundtrips_through_json() {
    let frame = Frame::new(vec![
        Column::categorical("t", vec![0.0, 2.0, 1.0]).unwrap(),
        Column::continuous("y", vec![0.5, -1.0, 3.25]).unwrap(),
    ])
    .unwrap();
    let json = serde_json::to_string(&frame).unwrap();
    let restored: Frame = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, frame);
    assert_eq!(restored.column_names(), vec!["t", "y"]);
}

#[test]
fn invalid_payload_is_rejected_on_decode() {
    let json = r#"[{"name":"d","kind":"binary","values":[0.0,3.0]}]"#;
    assert!(serde_json::from_str::<Frame>(json).is_err());
}

#[test]
fn type_tags_parse() {
    assert_eq!(VariableType::from_tag("b").unwrap(), VariableType::Binary);
    assert_eq!(VariableType::from_tag("u").unwrap(), VariableType::Categorical);
    assert_eq!("continuous".parse::<VariableType>().unwrap(), VariableType::Continuous);
    assert!(VariableType::from_tag("x").is_err());
}
