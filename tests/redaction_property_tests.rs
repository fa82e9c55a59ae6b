//! Property-based tests for permission redaction
//!
//! Redaction decides what a third party sees of a customer's accounts, so
//! these tests draw arbitrary permission sets and check that every field
//! group is shown exactly when the grants allow it, and that PAN masking is
//! independent of the tier.

use consent_engine::{
    EngineError,
    permission::{Permission, PermissionSet},
    redact::{PAN_PLACEHOLDER, PAN_SCHEME, redact, redact_all},
    resources::{Account, AccountIdentifier, Beneficiary, CreditDebit, Servicer, Transaction},
};
use proptest::prelude::*;

// PROPERTY TEST STRATEGIES

/// Strategy to generate any subset of the known permission codes
fn permission_set_strategy() -> impl Strategy<Value = PermissionSet> {
    prop::collection::vec(any::<bool>(), Permission::ALL.len()).prop_map(|mask| {
        Permission::ALL
            .into_iter()
            .zip(mask)
            .filter_map(|(permission, granted)| granted.then_some(permission))
            .collect()
    })
}

fn identifier_strategy() -> impl Strategy<Value = AccountIdentifier> {
    prop_oneof![
        "[0-9]{16}".prop_map(|pan| AccountIdentifier::new(PAN_SCHEME, &pan)),
        "[0-9]{14}".prop_map(|scan| AccountIdentifier::new("UK.OBIE.SortCodeAccountNumber", &scan)),
        "GB[0-9]{2}[A-Z]{4}[0-9]{14}".prop_map(|iban| AccountIdentifier::new("UK.OBIE.IBAN", &iban)),
    ]
}

fn account_strategy() -> impl Strategy<Value = Account> {
    (
        "acc-[0-9]{1,4}",
        prop::option::of("[A-Za-z ]{1,12}"),
        prop::collection::vec(identifier_strategy(), 0..4),
        any::<bool>(),
    )
        .prop_map(|(account_id, nickname, identifiers, has_servicer)| Account {
            account_id,
            currency: "GBP".into(),
            account_type: "Personal".into(),
            account_sub_type: "CurrentAccount".into(),
            nickname,
            status: "Enabled".into(),
            opening_date: None,
            account: Some(identifiers),
            servicer: has_servicer.then(|| Servicer {
                scheme_name: "UK.OBIE.BICFI".into(),
                identification: "BANKGB2L".into(),
            }),
        })
}

fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    ("t-[0-9]{1,6}", any::<bool>(), identifier_strategy()).prop_map(|(id, credit, counterparty)| {
        Transaction {
            transaction_id: id,
            account_id: "acc-1".into(),
            amount: "1.00".into(),
            currency: "GBP".into(),
            credit_debit: if credit {
                CreditDebit::Credit
            } else {
                CreditDebit::Debit
            },
            status: "Booked".into(),
            booking_date: "2024-05-30".into(),
            transaction_information: Some("Card purchase".into()),
            balance: None,
            merchant_details: None,
            creditor_account: Some(counterparty),
            debtor_account: None,
        }
    })
}

// PROPERTY TESTS
proptest! {
    /// Property: an account is shown iff some account tier is granted, and the
    /// identifier and servicer groups only at detail tier
    #[test]
    fn account_groups_follow_tier(grants in permission_set_strategy(), account in account_strategy()) {
        let basic = grants.contains(Permission::ReadAccountsBasic);
        let detail = grants.contains(Permission::ReadAccountsDetail);

        match redact(account.clone(), &grants) {
            Err(err) => {
                prop_assert!(!basic && !detail);
                prop_assert_eq!(err, EngineError::InsufficientPermissions { resource: "accounts".into() });
            }
            Ok(shown) => {
                prop_assert!(basic || detail);
                prop_assert_eq!(&shown.account_id, &account.account_id);
                prop_assert_eq!(&shown.nickname, &account.nickname);
                prop_assert_eq!(shown.account.is_some(), detail);
                prop_assert_eq!(shown.servicer.is_some(), detail && account.servicer.is_some());
            }
        }
    }

    /// Property: a visible PAN is masked unless ReadPAN is granted; other schemes never are
    #[test]
    fn pan_masked_without_read_pan(grants in permission_set_strategy(), account in account_strategy()) {
        let reveals = grants.contains(Permission::ReadPAN);
        let grants = grants.grant(Permission::ReadAccountsDetail);

        let shown = redact(account.clone(), &grants).unwrap();
        let before = account.account.unwrap_or_default();
        let after = shown.account.unwrap_or_default();
        prop_assert_eq!(before.len(), after.len());

        for (original, visible) in before.iter().zip(&after) {
            prop_assert_eq!(&original.scheme_name, &visible.scheme_name);
            if original.is_pan() && !reveals {
                prop_assert_eq!(visible.identification.as_str(), PAN_PLACEHOLDER);
            } else {
                prop_assert_eq!(&visible.identification, &original.identification);
            }
        }
    }

    /// Property: granting more never shows less
    #[test]
    fn more_permissions_never_hide_fields(
        grants in permission_set_strategy(),
        extra in permission_set_strategy(),
        account in account_strategy(),
    ) {
        let superset: PermissionSet = grants.iter().chain(extra.iter()).collect();

        if let Ok(narrow) = redact(account.clone(), &grants) {
            let wide = redact(account, &superset);
            prop_assert!(wide.is_ok());
            let wide = wide.unwrap();
            prop_assert!(narrow.account.is_none() || wide.account.is_some());
            prop_assert!(narrow.servicer.is_none() || wide.servicer.is_some());
        }
    }

    /// Property: a transaction list keeps exactly the entries whose direction is granted
    #[test]
    fn transaction_lists_filter_by_direction(
        grants in permission_set_strategy(),
        transactions in prop::collection::vec(transaction_strategy(), 0..12),
    ) {
        let tier = grants.contains(Permission::ReadTransactionsBasic)
            || grants.contains(Permission::ReadTransactionsDetail);

        match redact_all(transactions.clone(), &grants) {
            Err(_) => prop_assert!(!tier),
            Ok(shown) => {
                let expected: Vec<_> = transactions
                    .iter()
                    .filter(|t| match t.credit_debit {
                        CreditDebit::Credit => grants.contains(Permission::ReadTransactionsCredits),
                        CreditDebit::Debit => grants.contains(Permission::ReadTransactionsDebits),
                    })
                    .map(|t| t.transaction_id.clone())
                    .collect();
                let ids: Vec<_> = shown.iter().map(|t| t.transaction_id.clone()).collect();
                prop_assert_eq!(ids, expected);

                let detail = grants.contains(Permission::ReadTransactionsDetail);
                for t in &shown {
                    prop_assert_eq!(t.transaction_information.is_some(), detail);
                    prop_assert_eq!(t.creditor_account.is_some(), detail);
                }
            }
        }
    }

    /// Property: beneficiaries are never denied individually, only by missing tier
    #[test]
    fn beneficiaries_need_only_a_tier(grants in permission_set_strategy(), counterparty in identifier_strategy()) {
        let beneficiaries = vec![Beneficiary {
            beneficiary_id: "b-1".into(),
            account_id: "acc-1".into(),
            reference: Some("Rent".into()),
            creditor_agent: None,
            creditor_account: Some(counterparty),
        }];
        let tier = grants.contains(Permission::ReadBeneficiariesBasic)
            || grants.contains(Permission::ReadBeneficiariesDetail);

        match redact_all(beneficiaries, &grants) {
            Ok(shown) => {
                prop_assert!(tier);
                prop_assert_eq!(shown.len(), 1);
                prop_assert_eq!(
                    shown[0].creditor_account.is_some(),
                    grants.contains(Permission::ReadBeneficiariesDetail)
                );
            }
            Err(_) => prop_assert!(!tier),
        }
    }
}

#[test]
fn empty_grants_are_denied() {
    let err = redact_all::<Transaction>(vec![], &PermissionSet::new()).unwrap_err();
    assert_eq!(err.http_status(), 403);
}
