use serde::{Deserialize, Serialize};

// ============ Entity Models ============

/// A registered person. The phone number doubles as the login key for the
/// code-based authentication flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier, assigned sequentially.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// CPF document number.
    pub cpf: String,
    /// Email address.
    pub email: String,
    /// Phone number in display format (e.g. "+55 11 90000-0000").
    pub phone: String,
}

/// An installment-purchase (consórcio) plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier.
    pub id: i64,
    /// Commercial name of the plan.
    pub name: String,
    /// Total credit value in BRL.
    pub credit_value: f64,
    /// Number of installments. Always > 0; used as a denominator.
    pub installments: u32,
    /// Administrative fee percentage.
    pub admin_fee_percent: f64,
}

/// Lifecycle status of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Awarded,
    Delinquent,
    Settled,
}

impl ContractStatus {
    /// All statuses in their canonical reporting order.
    pub const ALL: [ContractStatus; 4] = [
        ContractStatus::Active,
        ContractStatus::Awarded,
        ContractStatus::Delinquent,
        ContractStatus::Settled,
    ];
}

/// A contract binding a person to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Unique identifier.
    pub id: i64,
    /// References an existing `Person`.
    pub person_id: i64,
    /// References an existing `Plan`.
    pub plan_id: i64,
    /// Contracting date (ISO date string).
    pub contracted_at: String,
    /// Current lifecycle status.
    pub status: ContractStatus,
    /// Installments paid so far. May exceed the plan's installment count in
    /// dirty data; the derived progress percentage clamps at 100.
    pub paid_installments: u32,
}

impl Contract {
    /// Percentage of the plan paid off, clamped to at most 100 and rounded to
    /// two decimal places.
    pub fn progress_percent(&self, plan: &Plan) -> f64 {
        if plan.installments == 0 {
            return 0.0;
        }
        let ratio = (self.paid_installments as f64 / plan.installments as f64).min(1.0);
        (ratio * 100.0 * 100.0).round() / 100.0
    }
}

/// A contract with its related entities resolved and the derived progress
/// attached. This is the shape returned by the contract endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractView {
    pub id: i64,
    pub person: Person,
    pub plan: Plan,
    pub contracted_at: String,
    pub status: ContractStatus,
    pub paid_installments: u32,
    pub progress_percent: f64,
}

// ============ Pagination ============

/// Offset pagination parameters. Defaults mirror the query surface: 5 items
/// from offset 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub const DEFAULT_PAGE_LIMIT: usize = 5;

impl Pagination {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub total_count: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

/// A page of nodes plus paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    pub page_info: PageInfo,
}

/// Slices `items` according to `pagination`, reporting the total count and
/// whether more items remain past this page.
pub fn paginate<T: Clone>(items: &[T], pagination: Pagination) -> Connection<T> {
    let limit = pagination.limit();
    let offset = pagination.offset();
    let total = items.len();
    let nodes = items
        .iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect::<Vec<_>>();
    Connection {
        nodes,
        page_info: PageInfo {
            total_count: total,
            limit,
            offset,
            has_more: offset + limit < total,
        },
    }
}

// ============ Query Parameters ============

/// Filter + paging parameters for contract listings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ContractFilter {
    pub status: Option<ContractStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ContractFilter {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Per-status contract totals for the status-counts report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: ContractStatus,
    pub total: usize,
}

// ============ Auth Payloads ============

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
}

/// Result of a login request. The verification code is echoed in `debug_code`
/// because SMS delivery is simulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub phone: String,
    pub message: String,
    pub debug_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub phone: String,
    pub code: String,
}

/// Session token plus the authenticated person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub person: Person,
}
