use do_core::{
    BackdoorIdentifier, Column, ErrorKind, Frame, IdentificationProvider, IdentifiedEstimand,
    RoleAssignment, VariableRole,
};

fn schema_frame() -> Frame {
    Frame::new(vec![
        Column::continuous("z", vec![0.1, 0.9]).unwrap(),
        Column::binary("d", vec![0.0, 1.0]).unwrap(),
        Column::continuous("y", vec![0.2, 2.8]).unwrap(),
    ])
    .unwrap()
}

#[test]
fn graphless_identification_requires_acknowledgement() {
    let roles = RoleAssignment::new(&["d"], &["y"], &["z"]).unwrap();
    let err = BackdoorIdentifier::new(false)
        .identify(&schema_frame().schema(), &roles)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Identification);
    assert_eq!(err.info().code, "unobserved-confounding");
}

#[test]
fn acknowledged_identification_uses_common_causes() {
    let roles = RoleAssignment::new(&["d"], &["y"], &["z"]).unwrap();
    let estimand = BackdoorIdentifier::new(true)
        .identify(&schema_frame().schema(), &roles)
        .unwrap();
    assert_eq!(estimand.adjustment_set, vec!["z".to_string()]);
    assert!(estimand.unobserved_confounding_ignored);
}

#[test]
fn placeholder_is_a_role_not_a_column() {
    let roles = RoleAssignment::new(&["d"], &["y"], &["z"])
        .unwrap()
        .with_unobserved_placeholder();
    assert!(roles.has_unobserved_placeholder());
    assert_eq!(roles.role_of("d"), Some(VariableRole::Treatment));
    assert!(roles
        .columns_with(VariableRole::UnobservedConfounder)
        .is_empty());
}

#[test]
fn placeholder_is_synthesized_once_and_drives_the_flag() {
    let identifier = BackdoorIdentifier::new(true);
    let declared = RoleAssignment::new(&["d"], &["y"], &["z"]).unwrap();
    let completed = identifier.complete_roles(&declared);
    assert!(!declared.has_unobserved_placeholder());
    assert!(completed.has_unobserved_placeholder());
    assert_eq!(completed.iter().count(), declared.iter().count() + 1);

    let already = declared.clone().with_unobserved_placeholder();
    assert_eq!(identifier.complete_roles(&already).iter().count(), already.iter().count());
    let estimand = identifier
        .identify(&schema_frame().schema(), &already)
        .unwrap();
    assert!(estimand.unobserved_confounding_ignored);
    assert_eq!(estimand.treatments, vec!["d".to_string()]);
}

#[test]
fn overlapping_roles_are_rejected() {
    let err = RoleAssignment::new(&["d"], &["d"], &["z"]).unwrap_err();
    assert_eq!(err.info().code, "overlapping-roles");
}

#[test]
fn estimand_with_missing_column_fails_validation() {
    let estimand = IdentifiedEstimand::backdoor(&["d"], &["y"], &["w"]);
    let err = estimand
        .validate_against(&schema_frame().schema())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}
