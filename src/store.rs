use crate::models::{Contract, ContractStatus, Person, Plan};
use std::sync::RwLock;

/// In-memory entity store: three ordered collections with identifier-indexed
/// lookup. Volatile by design; contents are seeded at startup and reset on
/// restart. Reads take a shared lock so the store stays correct under the
/// multi-threaded runtime even though the query surface never mutates it.
pub struct EntityStore {
    inner: RwLock<StoreData>,
}

#[derive(Default)]
struct StoreData {
    people: Vec<Person>,
    plans: Vec<Plan>,
    contracts: Vec<Contract>,
}

impl EntityStore {
    pub fn new(people: Vec<Person>, plans: Vec<Plan>, contracts: Vec<Contract>) -> Self {
        Self {
            inner: RwLock::new(StoreData {
                people,
                plans,
                contracts,
            }),
        }
    }

    /// Builds a store populated with the demo dataset. Person 1 carries the
    /// phone number used throughout the auth examples; contract 8 is
    /// deliberately over-paid to exercise the progress clamp.
    pub fn seeded() -> Self {
        let people = vec![
            person(1, "Ana Souza", "123.456.789-00", "ana.souza@example.com", "+55 11 90000-0000"),
            person(2, "Bruno Lima", "987.654.321-00", "bruno.lima@example.com", "+55 21 91111-1111"),
            person(3, "Carla Mendes", "111.222.333-44", "carla.mendes@example.com", "+55 31 92222-2222"),
            person(4, "Diego Ferreira", "555.666.777-88", "diego.ferreira@example.com", "+55 41 93333-3333"),
        ];
        let plans = vec![
            plan(1, "Auto 60k", 60_000.0, 60, 15.0),
            plan(2, "Auto 90k", 90_000.0, 72, 16.5),
            plan(3, "Imóvel 200k", 200_000.0, 180, 18.0),
            plan(4, "Imóvel 400k", 400_000.0, 200, 19.0),
            plan(5, "Serviços 15k", 15_000.0, 24, 12.0),
        ];
        let contracts = vec![
            contract(1, 1, 1, "2023-02-10", ContractStatus::Active, 14),
            contract(2, 1, 3, "2022-07-01", ContractStatus::Delinquent, 9),
            contract(3, 2, 1, "2024-01-15", ContractStatus::Active, 4),
            contract(4, 2, 2, "2021-11-20", ContractStatus::Awarded, 40),
            contract(5, 3, 4, "2020-05-05", ContractStatus::Settled, 200),
            contract(6, 3, 5, "2024-03-30", ContractStatus::Active, 2),
            contract(7, 4, 2, "2023-09-12", ContractStatus::Active, 11),
            contract(8, 4, 5, "2022-01-08", ContractStatus::Settled, 30),
        ];
        Self::new(people, plans, contracts)
    }

    // ---- People ----

    pub fn people(&self) -> Vec<Person> {
        self.inner.read().expect("store lock poisoned").people.clone()
    }

    pub fn person_by_id(&self, id: i64) -> Option<Person> {
        let data = self.inner.read().expect("store lock poisoned");
        data.people.iter().find(|p| p.id == id).cloned()
    }

    pub fn person_by_phone(&self, phone: &str) -> Option<Person> {
        let data = self.inner.read().expect("store lock poisoned");
        data.people.iter().find(|p| p.phone == phone).cloned()
    }

    /// Batch lookup: one lock acquisition for the whole identifier set,
    /// results positionally aligned with `ids`.
    pub fn people_by_ids(&self, ids: &[i64]) -> Vec<Option<Person>> {
        let data = self.inner.read().expect("store lock poisoned");
        ids.iter()
            .map(|id| data.people.iter().find(|p| p.id == *id).cloned())
            .collect()
    }

    // ---- Plans ----

    pub fn plans(&self) -> Vec<Plan> {
        self.inner.read().expect("store lock poisoned").plans.clone()
    }

    pub fn plan_by_id(&self, id: i64) -> Option<Plan> {
        let data = self.inner.read().expect("store lock poisoned");
        data.plans.iter().find(|p| p.id == id).cloned()
    }

    pub fn plans_by_ids(&self, ids: &[i64]) -> Vec<Option<Plan>> {
        let data = self.inner.read().expect("store lock poisoned");
        ids.iter()
            .map(|id| data.plans.iter().find(|p| p.id == *id).cloned())
            .collect()
    }

    // ---- Contracts ----

    pub fn contracts(&self) -> Vec<Contract> {
        self.inner
            .read()
            .expect("store lock poisoned")
            .contracts
            .clone()
    }

    pub fn contract_by_id(&self, id: i64) -> Option<Contract> {
        let data = self.inner.read().expect("store lock poisoned");
        data.contracts.iter().find(|c| c.id == id).cloned()
    }

    pub fn contracts_by_person(&self, person_id: i64) -> Vec<Contract> {
        let data = self.inner.read().expect("store lock poisoned");
        data.contracts
            .iter()
            .filter(|c| c.person_id == person_id)
            .cloned()
            .collect()
    }

    pub fn contracts_by_plan(&self, plan_id: i64) -> Vec<Contract> {
        let data = self.inner.read().expect("store lock poisoned");
        data.contracts
            .iter()
            .filter(|c| c.plan_id == plan_id)
            .cloned()
            .collect()
    }
}

fn person(id: i64, name: &str, cpf: &str, email: &str, phone: &str) -> Person {
    Person {
        id,
        name: name.to_string(),
        cpf: cpf.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
    }
}

fn plan(id: i64, name: &str, credit_value: f64, installments: u32, admin_fee_percent: f64) -> Plan {
    Plan {
        id,
        name: name.to_string(),
        credit_value,
        installments,
        admin_fee_percent,
    }
}

fn contract(
    id: i64,
    person_id: i64,
    plan_id: i64,
    contracted_at: &str,
    status: ContractStatus,
    paid_installments: u32,
) -> Contract {
    Contract {
        id,
        person_id,
        plan_id,
        contracted_at: contracted_at.to_string(),
        status,
        paid_installments,
    }
}
