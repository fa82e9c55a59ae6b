//! Permission codes granted by an account-access consent.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    ReadAccountsBasic,
    ReadAccountsDetail,
    ReadBalances,
    ReadBeneficiariesBasic,
    ReadBeneficiariesDetail,
    ReadDirectDebits,
    ReadOffers,
    ReadPAN,
    ReadParty,
    ReadPartyPSU,
    ReadProducts,
    ReadScheduledPaymentsBasic,
    ReadScheduledPaymentsDetail,
    ReadStandingOrdersBasic,
    ReadStandingOrdersDetail,
    ReadStatementsBasic,
    ReadStatementsDetail,
    ReadTransactionsBasic,
    ReadTransactionsCredits,
    ReadTransactionsDebits,
    ReadTransactionsDetail,
}

impl Permission {
    pub const ALL: [Permission; 21] = [
        Permission::ReadAccountsBasic,
        Permission::ReadAccountsDetail,
        Permission::ReadBalances,
        Permission::ReadBeneficiariesBasic,
        Permission::ReadBeneficiariesDetail,
        Permission::ReadDirectDebits,
        Permission::ReadOffers,
        Permission::ReadPAN,
        Permission::ReadParty,
        Permission::ReadPartyPSU,
        Permission::ReadProducts,
        Permission::ReadScheduledPaymentsBasic,
        Permission::ReadScheduledPaymentsDetail,
        Permission::ReadStandingOrdersBasic,
        Permission::ReadStandingOrdersDetail,
        Permission::ReadStatementsBasic,
        Permission::ReadStatementsDetail,
        Permission::ReadTransactionsBasic,
        Permission::ReadTransactionsCredits,
        Permission::ReadTransactionsDebits,
        Permission::ReadTransactionsDetail,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Permission::ReadAccountsBasic => "ReadAccountsBasic",
            Permission::ReadAccountsDetail => "ReadAccountsDetail",
            Permission::ReadBalances => "ReadBalances",
            Permission::ReadBeneficiariesBasic => "ReadBeneficiariesBasic",
            Permission::ReadBeneficiariesDetail => "ReadBeneficiariesDetail",
            Permission::ReadDirectDebits => "ReadDirectDebits",
            Permission::ReadOffers => "ReadOffers",
            Permission::ReadPAN => "ReadPAN",
            Permission::ReadParty => "ReadParty",
            Permission::ReadPartyPSU => "ReadPartyPSU",
            Permission::ReadProducts => "ReadProducts",
            Permission::ReadScheduledPaymentsBasic => "ReadScheduledPaymentsBasic",
            Permission::ReadScheduledPaymentsDetail => "ReadScheduledPaymentsDetail",
            Permission::ReadStandingOrdersBasic => "ReadStandingOrdersBasic",
            Permission::ReadStandingOrdersDetail => "ReadStandingOrdersDetail",
            Permission::ReadStatementsBasic => "ReadStatementsBasic",
            Permission::ReadStatementsDetail => "ReadStatementsDetail",
            Permission::ReadTransactionsBasic => "ReadTransactionsBasic",
            Permission::ReadTransactionsCredits => "ReadTransactionsCredits",
            Permission::ReadTransactionsDebits => "ReadTransactionsDebits",
            Permission::ReadTransactionsDetail => "ReadTransactionsDetail",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown permission code '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// Resource families whose responses are redacted by permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Accounts,
    Beneficiaries,
    Transactions,
}

impl ResourceKind {
    pub fn basic(&self) -> Permission {
        match self {
            ResourceKind::Accounts => Permission::ReadAccountsBasic,
            ResourceKind::Beneficiaries => Permission::ReadBeneficiariesBasic,
            ResourceKind::Transactions => Permission::ReadTransactionsBasic,
        }
    }
    pub fn detail(&self) -> Permission {
        match self {
            ResourceKind::Accounts => Permission::ReadAccountsDetail,
            ResourceKind::Beneficiaries => Permission::ReadBeneficiariesDetail,
            ResourceKind::Transactions => Permission::ReadTransactionsDetail,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Accounts => "accounts",
            ResourceKind::Beneficiaries => "beneficiaries",
            ResourceKind::Transactions => "transactions",
        }
    }
}

/// How much of a resource family a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Basic,
    Detail,
}

/// The permissions granted on a consent. Unknown codes are dropped on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_codes<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = BTreeSet::new();
        for code in codes {
            match code.parse::<Permission>() {
                Ok(permission) => {
                    set.insert(permission);
                }
                Err(err) => debug!(%err, "ignoring permission code"),
            }
        }
        Self(set)
    }

    pub fn grant(mut self, permission: Permission) -> Self {
        self.0.insert(permission);
        self
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// Detail supersedes basic; `None` when neither is granted.
    pub fn tier_for(&self, kind: ResourceKind) -> Option<Tier> {
        if self.contains(kind.detail()) {
            Some(Tier::Detail)
        } else if self.contains(kind.basic()) {
            Some(Tier::Basic)
        } else {
            None
        }
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_str() {
        for permission in Permission::ALL {
            assert_eq!(permission.code().parse::<Permission>(), Ok(permission));
        }
    }

    #[test]
    fn unknown_codes_are_dropped() {
        let set = PermissionSet::from_codes(["ReadAccountsBasic", "ReadEverything", ""]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Permission::ReadAccountsBasic]);
    }

    #[test]
    fn detail_supersedes_basic() {
        let both = PermissionSet::new()
            .grant(Permission::ReadAccountsBasic)
            .grant(Permission::ReadAccountsDetail);
        assert_eq!(both.tier_for(ResourceKind::Accounts), Some(Tier::Detail));
        assert_eq!(both.tier_for(ResourceKind::Beneficiaries), None);
    }
}
