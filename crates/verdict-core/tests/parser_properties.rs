//! Property tests for the header parsers

use proptest::prelude::*;
use verdict_core::{parse_diversion, parse_uri, parse_via, DiversionLookup};

fn arb_user() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"\+?[a-z0-9]{1,12}").unwrap()
}

fn arb_host() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-z0-9][a-z0-9.\-]{0,20}").unwrap()
}

fn arb_params() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"([a-z]{1,6}=[a-z0-9]{1,6})(;[a-z]{1,6}=[a-z0-9]{1,6}){0,2}").unwrap()
}

proptest! {
    /// Every component of a well-formed address survives parsing
    #[test]
    fn proptest_uri_components_recovered(
        user in arb_user(),
        host in arb_host(),
        port in prop::option::of(any::<u16>()),
        params in prop::option::of(arb_params()),
    ) {
        let mut raw = format!("sip:{}@{}", user, host);
        if let Some(port) = port {
            raw.push_str(&format!(":{}", port));
        }
        if let Some(params) = &params {
            raw.push(';');
            raw.push_str(params);
        }

        let parsed = parse_uri(&format!("<{}>", raw));
        prop_assert_eq!(parsed.user.as_deref(), Some(user.as_str()));
        prop_assert_eq!(parsed.host.as_deref(), Some(host.as_str()));
        prop_assert_eq!(parsed.port, port);
        prop_assert_eq!(parsed.parameters, Some(params.unwrap_or_default()));
    }

    /// URI and Diversion parsers agree on values without a `>` before the parameters
    #[test]
    fn proptest_diversion_matches_uri_on_plain_values(
        user in arb_user(),
        host in arb_host(),
        params in arb_params(),
    ) {
        let raw = format!("sip:{}@{};{}", user, host, params);
        match parse_diversion(&raw) {
            DiversionLookup::Found(address) => prop_assert_eq!(address, parse_uri(&raw)),
            DiversionLookup::NotFound => prop_assert!(false, "diversion not found in {}", raw),
        }
    }

    /// Values without a `sip:` scheme are never found
    #[test]
    fn proptest_diversion_without_scheme_not_found(raw in r"[a-z0-9 <>@.;=+]{0,40}") {
        prop_assert_eq!(parse_diversion(&raw), DiversionLookup::NotFound);
        prop_assert!(!parse_uri(&raw).is_parsed());
    }

    /// Arbitrary input never panics any parser
    #[test]
    fn proptest_parsers_total(raw in any::<String>()) {
        let _ = parse_uri(&raw);
        let _ = parse_via(&raw);
        let _ = parse_diversion(&raw);
    }

    /// A magic-cookie branch is lifted out wherever it sits in the parameter list
    #[test]
    fn proptest_via_branch_extracted(
        host in prop::string::string_regex(r"[a-z0-9][a-z0-9.\-]{0,20}").unwrap(),
        port in any::<u16>(),
        suffix in "[a-zA-Z0-9]{1,16}",
        before in prop::option::of("rport"),
        after in prop::option::of("received=10\\.0\\.0\\.[0-9]{1,2}"),
    ) {
        let branch = format!("z9hG4bK{}", suffix);
        let mut params: Vec<String> = Vec::new();
        params.extend(before.clone());
        params.push(format!("branch={}", branch));
        params.extend(after.clone());

        let raw = format!("SIP/2.0/UDP {}:{};{}", host, port, params.join(";"));
        let parsed = parse_via(&raw);

        let rest: Vec<String> = before.into_iter().chain(after).collect();
        prop_assert_eq!(parsed.host.as_deref(), Some(host.as_str()));
        prop_assert_eq!(parsed.port, Some(port));
        prop_assert_eq!(parsed.branch, Some(branch));
        prop_assert_eq!(parsed.parameters, Some(rest.join(";")));
    }
}
