use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    // Review
    pub tasks_opened: IntCounter,
    pub items_submitted: IntCounter,
    pub votes_cast: IntCounter,
    pub items_adopted: IntCounter,
    pub items_deleted: IntCounter,

    // Settlement and rewards
    pub settlements_total: IntCounter,
    pub claims_total: IntCounter,
    pub claimed_amount: IntCounter,
    pub clawbacks_total: IntCounter,
    pub clawed_amount: IntCounter,

    // Arbitration
    pub cases_opened: IntCounter,
    pub cases_resolved: IntCounter,
    pub cases_overturned: IntCounter,
    pub open_cases: IntGauge,

    pub collaborator_failures: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let tasks_opened = IntCounter::new("curia_tasks_opened_total", "Tasks opened")?;
        let items_submitted = IntCounter::new("curia_items_submitted_total", "Items submitted")?;
        let votes_cast = IntCounter::new("curia_votes_cast_total", "Review votes accepted")?;
        let items_adopted =
            IntCounter::new("curia_items_adopted_total", "Items finalized as adopted")?;
        let items_deleted =
            IntCounter::new("curia_items_deleted_total", "Items finalized as deleted")?;

        let settlements_total =
            IntCounter::new("curia_settlements_total", "Settlement records locked")?;
        let claims_total = IntCounter::new("curia_claims_total", "Reward claims paying out")?;
        let claimed_amount =
            IntCounter::new("curia_claimed_base_units_total", "Base units paid out by claims")?;
        let clawbacks_total =
            IntCounter::new("curia_clawbacks_total", "Settlement reversals after overturn")?;
        let clawed_amount =
            IntCounter::new("curia_clawed_base_units_total", "Base units clawed back")?;

        let cases_opened = IntCounter::new("curia_cases_opened_total", "Arbitration cases opened")?;
        let cases_resolved =
            IntCounter::new("curia_cases_resolved_total", "Arbitration cases resolved")?;
        let cases_overturned =
            IntCounter::new("curia_cases_overturned_total", "Arbitration cases overturned")?;
        let open_cases = IntGauge::new("curia_open_cases", "Arbitration cases awaiting a verdict")?;

        let collaborator_failures = IntCounter::new(
            "curia_collaborator_failures_total",
            "Operations rolled back after a collaborator failure",
        )?;

        registry.register(Box::new(tasks_opened.clone()))?;
        registry.register(Box::new(items_submitted.clone()))?;
        registry.register(Box::new(votes_cast.clone()))?;
        registry.register(Box::new(items_adopted.clone()))?;
        registry.register(Box::new(items_deleted.clone()))?;
        registry.register(Box::new(settlements_total.clone()))?;
        registry.register(Box::new(claims_total.clone()))?;
        registry.register(Box::new(claimed_amount.clone()))?;
        registry.register(Box::new(clawbacks_total.clone()))?;
        registry.register(Box::new(clawed_amount.clone()))?;
        registry.register(Box::new(cases_opened.clone()))?;
        registry.register(Box::new(cases_resolved.clone()))?;
        registry.register(Box::new(cases_overturned.clone()))?;
        registry.register(Box::new(open_cases.clone()))?;
        registry.register(Box::new(collaborator_failures.clone()))?;

        Ok(Self {
            registry,
            tasks_opened,
            items_submitted,
            votes_cast,
            items_adopted,
            items_deleted,
            settlements_total,
            claims_total,
            claimed_amount,
            clawbacks_total,
            clawed_amount,
            cases_opened,
            cases_resolved,
            cases_overturned,
            open_cases,
            collaborator_failures,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}
