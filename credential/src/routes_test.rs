use super::*;

// =============================================================================
// matches_rule
// =============================================================================

#[test]
fn rule_matches_exact_path() {
    assert!(matches_rule("/feed", "/feed"));
}

#[test]
fn rule_matches_sub_path() {
    assert!(matches_rule("/feed/42", "/feed"));
}

#[test]
fn rule_does_not_match_sibling_with_shared_prefix() {
    assert!(!matches_rule("/feedback", "/feed"));
}

#[test]
fn wildcard_rule_matches_raw_prefix() {
    assert!(matches_rule("/feedback", "/feed*"));
    assert!(matches_rule("/feed", "/feed*"));
}

#[test]
fn root_rule_only_matches_root() {
    assert!(matches_rule("/", "/"));
    assert!(!matches_rule("/feed", "/"));
}

// =============================================================================
// classify
// =============================================================================

#[test]
fn camply_table_classifies_protected_pages() {
    let table = RouteTable::camply();
    for path in ["/feed", "/profile/edit", "/settings/profile", "/dashboard"] {
        assert_eq!(table.classify(path), RouteClass::Protected, "{path}");
    }
}

#[test]
fn camply_table_classifies_auth_pages() {
    let table = RouteTable::camply();
    for path in ["/login", "/register", "/auth/login", "/auth/register"] {
        assert_eq!(table.classify(path), RouteClass::AuthOnly, "{path}");
    }
}

#[test]
fn admin_wins_over_protected() {
    let table = RouteTable::camply();
    assert_eq!(table.classify("/admin"), RouteClass::Admin);
    assert_eq!(table.classify("/admin/users"), RouteClass::Admin);
}

#[test]
fn public_and_unlisted_paths_are_public() {
    let table = RouteTable::camply();
    assert_eq!(table.classify("/"), RouteClass::Public);
    assert_eq!(table.classify("/camps/12"), RouteClass::Public);
    assert_eq!(table.classify("/auth/reset-password"), RouteClass::Public);
    assert_eq!(table.classify("/someone"), RouteClass::Public);
}

#[test]
fn empty_table_treats_everything_as_public() {
    assert_eq!(RouteTable::default().classify("/feed"), RouteClass::Public);
}

#[test]
fn custom_rules_extend_a_class() {
    let table = RouteTable::default().with(RouteClass::Protected, ["/messages"]);
    assert_eq!(table.classify("/messages/7"), RouteClass::Protected);
}

#[test]
fn requires_credential_only_for_protected_and_admin() {
    assert!(RouteClass::Protected.requires_credential());
    assert!(RouteClass::Admin.requires_credential());
    assert!(!RouteClass::AuthOnly.requires_credential());
    assert!(!RouteClass::Public.requires_credential());
}
