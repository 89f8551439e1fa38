//! Canonical vocabulary for transaction and category kinds.
//!
//! Values are stored in Portuguese (`receita`, `despesa`, `transferencia`).
//! Older databases used English labels and a handful of synonyms; those are
//! accepted as import formats only and are rewritten by the migrations.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "receita")]
    Income,
    #[serde(rename = "despesa")]
    Expense,
    #[serde(rename = "transferencia")]
    Transfer,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 3] = [
        TransactionKind::Income,
        TransactionKind::Expense,
        TransactionKind::Transfer,
    ];

    /// The label persisted in `transactions.transaction_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "receita",
            TransactionKind::Expense => "despesa",
            TransactionKind::Transfer => "transferencia",
        }
    }

    /// Legacy labels that normalize to this kind.
    pub fn legacy_labels(&self) -> &'static [&'static str] {
        match self {
            TransactionKind::Income => &["income", "entrada", "credit"],
            TransactionKind::Expense => &["expense", "saida", "debit"],
            TransactionKind::Transfer => &["transfer", "transfer_in", "transfer_out"],
        }
    }

    /// Parse a stored label, canonical or legacy. Matching ignores case and
    /// surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == label || kind.legacy_labels().contains(&label.as_str()))
    }

    /// Kind implied by the sign of an amount, for rows that never had a
    /// kind column at all.
    pub fn from_amount_sign(amount: f64) -> Self {
        if amount >= 0.0 {
            TransactionKind::Income
        } else {
            TransactionKind::Expense
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryKind {
    #[serde(rename = "receita")]
    Income,
    #[serde(rename = "despesa")]
    Expense,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 2] = [CategoryKind::Income, CategoryKind::Expense];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "receita",
            CategoryKind::Expense => "despesa",
        }
    }

    pub fn legacy_labels(&self) -> &'static [&'static str] {
        match self {
            CategoryKind::Income => &["income", "entrada"],
            CategoryKind::Expense => &["expense", "saida"],
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == label || kind.legacy_labels().contains(&label.as_str()))
    }
}
