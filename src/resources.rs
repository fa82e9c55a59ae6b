//! Account-information resources and callback registrations
use crate::permission::{Permission, ResourceKind, Tier};
use crate::redact::{PAN_PLACEHOLDER, PAN_SCHEME, Redact, View};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentifier {
    #[n(0)]
    pub scheme_name: String, // e.g. UK.OBIE.SortCodeAccountNumber
    #[n(1)]
    pub identification: String,
    #[n(2)]
    pub name: Option<String>,
    #[n(3)]
    pub secondary_identification: Option<String>,
}

impl AccountIdentifier {
    pub fn new(scheme_name: &str, identification: &str) -> Self {
        Self {
            scheme_name: scheme_name.to_string(),
            identification: identification.to_string(),
            name: None,
            secondary_identification: None,
        }
    }

    pub fn is_pan(&self) -> bool {
        self.scheme_name == PAN_SCHEME
    }

    fn masked_for(mut self, view: &View<'_>) -> Self {
        if self.is_pan() && !view.reveals_pan() {
            self.identification = PAN_PLACEHOLDER.to_string();
        }
        self
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Servicer {
    #[n(0)]
    pub scheme_name: String,
    #[n(1)]
    pub identification: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    #[n(0)]
    pub account_id: String,
    #[n(1)]
    pub currency: String,
    #[n(2)]
    pub account_type: String,
    #[n(3)]
    pub account_sub_type: String,
    #[n(4)]
    pub nickname: Option<String>,
    #[n(5)]
    pub status: String,
    #[n(6)]
    pub opening_date: Option<String>,
    // detail
    #[n(7)]
    pub account: Option<Vec<AccountIdentifier>>,
    #[n(8)]
    pub servicer: Option<Servicer>,
}

impl Redact for Account {
    const KIND: ResourceKind = ResourceKind::Accounts;

    fn redact_with(self, view: &View<'_>) -> Self {
        Self {
            account: view.group(Tier::Detail, self.account).map(|ids| {
                ids.into_iter().map(|id| id.masked_for(view)).collect()
            }),
            servicer: view.group(Tier::Detail, self.servicer),
            ..self
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Beneficiary {
    #[n(0)]
    pub beneficiary_id: String,
    #[n(1)]
    pub account_id: String,
    #[n(2)]
    pub reference: Option<String>,
    // detail
    #[n(3)]
    pub creditor_agent: Option<Servicer>,
    #[n(4)]
    pub creditor_account: Option<AccountIdentifier>,
}

impl Redact for Beneficiary {
    const KIND: ResourceKind = ResourceKind::Beneficiaries;

    fn redact_with(self, view: &View<'_>) -> Self {
        Self {
            creditor_agent: view.group(Tier::Detail, self.creditor_agent),
            creditor_account: view
                .group(Tier::Detail, self.creditor_account)
                .map(|id| id.masked_for(view)),
            ..self
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditDebit {
    #[n(0)]
    Credit,
    #[n(1)]
    Debit,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Balance {
    #[n(0)]
    pub amount: String,
    #[n(1)]
    pub currency: String,
    #[n(2)]
    pub credit_debit: CreditDebit,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct MerchantDetails {
    #[n(0)]
    pub merchant_name: Option<String>,
    #[n(1)]
    pub merchant_category_code: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    #[n(0)]
    pub transaction_id: String,
    #[n(1)]
    pub account_id: String,
    #[n(2)]
    pub amount: String,
    #[n(3)]
    pub currency: String,
    #[n(4)]
    pub credit_debit: CreditDebit,
    #[n(5)]
    pub status: String,
    #[n(6)]
    pub booking_date: String,
    // detail
    #[n(7)]
    pub transaction_information: Option<String>,
    #[n(8)]
    pub balance: Option<Balance>,
    #[n(9)]
    pub merchant_details: Option<MerchantDetails>,
    #[n(10)]
    pub creditor_account: Option<AccountIdentifier>,
    #[n(11)]
    pub debtor_account: Option<AccountIdentifier>,
}

impl Redact for Transaction {
    const KIND: ResourceKind = ResourceKind::Transactions;

    fn visible_to(&self, view: &View<'_>) -> bool {
        match self.credit_debit {
            CreditDebit::Credit => view.grants(Permission::ReadTransactionsCredits),
            CreditDebit::Debit => view.grants(Permission::ReadTransactionsDebits),
        }
    }

    fn redact_with(self, view: &View<'_>) -> Self {
        Self {
            transaction_information: view.group(Tier::Detail, self.transaction_information),
            balance: view.group(Tier::Detail, self.balance),
            merchant_details: view.group(Tier::Detail, self.merchant_details),
            creditor_account: view
                .group(Tier::Detail, self.creditor_account)
                .map(|id| id.masked_for(view)),
            debtor_account: view
                .group(Tier::Detail, self.debtor_account)
                .map(|id| id.masked_for(view)),
            ..self
        }
    }
}

/// Where event notifications for an API client are delivered.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrl {
    #[n(0)]
    pub callback_url_id: String,
    #[n(1)]
    pub url: String,
}
