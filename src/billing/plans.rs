use serde::{Deserialize, Serialize};

/// key: billing-plans -> static catalog,feature limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanFeature {
    AutoGenerations,
    PropertyPosts,
    Leads,
    MonthlyInvoices,
}

impl PlanFeature {
    pub const ALL: [PlanFeature; 4] = [
        PlanFeature::AutoGenerations,
        PlanFeature::PropertyPosts,
        PlanFeature::Leads,
        PlanFeature::MonthlyInvoices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanFeature::AutoGenerations => "auto_generations",
            PlanFeature::PropertyPosts => "property_posts",
            PlanFeature::Leads => "leads",
            PlanFeature::MonthlyInvoices => "monthly_invoices",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto_generations" => Some(PlanFeature::AutoGenerations),
            "property_posts" => Some(PlanFeature::PropertyPosts),
            "leads" => Some(PlanFeature::Leads),
            "monthly_invoices" => Some(PlanFeature::MonthlyInvoices),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub key: &'static str,
    pub name: &'static str,
    auto_generations: Option<i64>,
    property_posts: Option<i64>,
    leads: Option<i64>,
    monthly_invoices: Option<i64>,
}

impl Plan {
    /// `None` means unlimited. Limits apply per metering period and may
    /// change between releases without touching past counters.
    pub fn limit(&self, feature: PlanFeature) -> Option<i64> {
        match feature {
            PlanFeature::AutoGenerations => self.auto_generations,
            PlanFeature::PropertyPosts => self.property_posts,
            PlanFeature::Leads => self.leads,
            PlanFeature::MonthlyInvoices => self.monthly_invoices,
        }
    }
}

const CATALOG: [Plan; 3] = [
    Plan {
        key: "free",
        name: "Free",
        auto_generations: Some(5),
        property_posts: Some(3),
        leads: Some(20),
        monthly_invoices: Some(10),
    },
    Plan {
        key: "pro",
        name: "Pro",
        auto_generations: Some(50),
        property_posts: Some(25),
        leads: Some(500),
        monthly_invoices: Some(100),
    },
    Plan {
        key: "business",
        name: "Business",
        auto_generations: None,
        property_posts: None,
        leads: None,
        monthly_invoices: None,
    },
];

/// Exact catalog lookup, for callers that must reject unknown keys.
pub fn find(key: &str) -> Option<&'static Plan> {
    CATALOG.iter().find(|plan| plan.key == key)
}

/// Unknown plan keys fall back to the free tier rather than failing the
/// request; a stale plan_key should degrade, not error.
pub fn plan_for(key: &str) -> &'static Plan {
    CATALOG
        .iter()
        .find(|plan| plan.key == key)
        .unwrap_or(&CATALOG[0])
}
