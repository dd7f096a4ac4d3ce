use std::sync::Arc;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{QuoteFlowError, Result};
use crate::form::QuoteForm;

/// The ten wizard states, in visit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    TaxYear,
    MaritalStatus,
    Children,
    Incomes,
    Wealth,
    Properties,
    NewProperties,
    Offer,
    Summary,
    Billing,
}

impl Step {
    pub const FIRST: Step = Step::TaxYear;

    /// 1-based index as shown in the progress UI and stored server-side
    pub fn index(self) -> u8 {
        match self {
            Step::TaxYear => 1,
            Step::MaritalStatus => 2,
            Step::Children => 3,
            Step::Incomes => 4,
            Step::Wealth => 5,
            Step::Properties => 6,
            Step::NewProperties => 7,
            Step::Offer => 8,
            Step::Summary => 9,
            Step::Billing => 10,
        }
    }

    pub fn from_index(index: u8) -> Option<Step> {
        match index {
            1 => Some(Step::TaxYear),
            2 => Some(Step::MaritalStatus),
            3 => Some(Step::Children),
            4 => Some(Step::Incomes),
            5 => Some(Step::Wealth),
            6 => Some(Step::Properties),
            7 => Some(Step::NewProperties),
            8 => Some(Step::Offer),
            9 => Some(Step::Summary),
            10 => Some(Step::Billing),
            _ => None,
        }
    }

    /// Validate only this step's declared required fields.
    ///
    /// A failure blocks forward navigation and never reaches the network.
    pub fn validate(self, form: &QuoteForm) -> Result<()> {
        match self {
            Step::TaxYear => {
                let current = chrono::Utc::now().year();
                if form.tax_year < 2000 || form.tax_year > current {
                    return Err(QuoteFlowError::Validation {
                        field: "tax_year",
                        reason: format!("must be between 2000 and {current}"),
                    });
                }
                Ok(())
            }
            Step::NewProperties => {
                // cross-field invariant: 0 <= new_properties <= properties
                if form.new_properties > form.properties {
                    return Err(QuoteFlowError::Validation {
                        field: "new_properties",
                        reason: format!(
                            "cannot exceed property count ({} > {})",
                            form.new_properties, form.properties
                        ),
                    });
                }
                Ok(())
            }
            Step::Billing => {
                let b = &form.billing;
                for (field, value) in [
                    ("billing_name", &b.billing_name),
                    ("billing_street", &b.billing_street),
                    ("billing_postal_code", &b.billing_postal_code),
                    ("billing_city", &b.billing_city),
                ] {
                    if value.trim().is_empty() {
                        return Err(QuoteFlowError::Validation {
                            field,
                            reason: "required".to_string(),
                        });
                    }
                }
                if !b.billing_email.contains('@') {
                    return Err(QuoteFlowError::Validation {
                        field: "billing_email",
                        reason: "not a valid email address".to_string(),
                    });
                }
                Ok(())
            }
            // count fields are unsigned, nothing further to check
            _ => Ok(()),
        }
    }
}

/// Condition over the current form values gating a transition
pub type EdgeCondition = Arc<dyn Fn(&QuoteForm) -> bool + Send + Sync>;

/// A declared transition between wizard steps
#[derive(Clone)]
pub struct Edge {
    pub from: Step,
    pub to: Step,
    pub condition: Option<EdgeCondition>,
    /// Entering the target through this edge requires a price calculation
    pub fetch_prices: bool,
}

/// Result of resolving a transition against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub to: Step,
    pub fetch_prices: bool,
}

/// The wizard's transition table.
///
/// Skip logic is declared as conditional edges rather than inline index
/// arithmetic; the first matching edge wins, so conditional edges are
/// registered ahead of the default edge for the same source step.
pub struct StepGraph {
    forward: Vec<Edge>,
    backward: Vec<Edge>,
}

impl StepGraph {
    pub fn new() -> Self {
        Self {
            forward: Vec::new(),
            backward: Vec::new(),
        }
    }

    pub fn add_edge(&mut self, from: Step, to: Step) -> &mut Self {
        self.forward.push(Edge {
            from,
            to,
            condition: None,
            fetch_prices: false,
        });
        self
    }

    pub fn add_pricing_edge(&mut self, from: Step, to: Step) -> &mut Self {
        self.forward.push(Edge {
            from,
            to,
            condition: None,
            fetch_prices: true,
        });
        self
    }

    pub fn add_conditional_edge<F>(&mut self, from: Step, to: Step, condition: F) -> &mut Self
    where
        F: Fn(&QuoteForm) -> bool + Send + Sync + 'static,
    {
        self.forward.push(Edge {
            from,
            to,
            condition: Some(Arc::new(condition)),
            fetch_prices: false,
        });
        self
    }

    pub fn add_conditional_pricing_edge<F>(&mut self, from: Step, to: Step, condition: F) -> &mut Self
    where
        F: Fn(&QuoteForm) -> bool + Send + Sync + 'static,
    {
        self.forward.push(Edge {
            from,
            to,
            condition: Some(Arc::new(condition)),
            fetch_prices: true,
        });
        self
    }

    pub fn add_back_edge(&mut self, from: Step, to: Step) -> &mut Self {
        self.backward.push(Edge {
            from,
            to,
            condition: None,
            fetch_prices: false,
        });
        self
    }

    pub fn add_conditional_back_edge<F>(&mut self, from: Step, to: Step, condition: F) -> &mut Self
    where
        F: Fn(&QuoteForm) -> bool + Send + Sync + 'static,
    {
        self.backward.push(Edge {
            from,
            to,
            condition: Some(Arc::new(condition)),
            fetch_prices: false,
        });
        self
    }

    /// The standard 10-step quote flow
    pub fn standard() -> Self {
        let mut graph = StepGraph::new();

        graph
            .add_edge(Step::TaxYear, Step::MaritalStatus)
            .add_edge(Step::MaritalStatus, Step::Children)
            .add_edge(Step::Children, Step::Incomes)
            .add_edge(Step::Incomes, Step::Wealth)
            .add_edge(Step::Wealth, Step::Properties)
            // no properties: skip the new-properties step straight to pricing
            .add_conditional_pricing_edge(Step::Properties, Step::Offer, |form| {
                form.properties == 0
            })
            .add_edge(Step::Properties, Step::NewProperties)
            .add_pricing_edge(Step::NewProperties, Step::Offer)
            .add_edge(Step::Offer, Step::Summary)
            .add_edge(Step::Summary, Step::Billing);

        graph
            .add_back_edge(Step::MaritalStatus, Step::TaxYear)
            .add_back_edge(Step::Children, Step::MaritalStatus)
            .add_back_edge(Step::Incomes, Step::Children)
            .add_back_edge(Step::Wealth, Step::Incomes)
            .add_back_edge(Step::Properties, Step::Wealth)
            .add_back_edge(Step::NewProperties, Step::Properties)
            // mirror of the forward skip
            .add_conditional_back_edge(Step::Offer, Step::Properties, |form| form.properties == 0)
            .add_back_edge(Step::Offer, Step::NewProperties)
            .add_back_edge(Step::Summary, Step::Offer)
            .add_back_edge(Step::Billing, Step::Summary);

        graph
    }

    pub fn next(&self, from: Step, form: &QuoteForm) -> Option<Transition> {
        Self::find(&self.forward, from, form)
    }

    pub fn prev(&self, from: Step, form: &QuoteForm) -> Option<Transition> {
        Self::find(&self.backward, from, form)
    }

    fn find(edges: &[Edge], from: Step, form: &QuoteForm) -> Option<Transition> {
        for edge in edges {
            if edge.from != from {
                continue;
            }
            match &edge.condition {
                Some(condition) if !condition(form) => continue,
                _ => {
                    return Some(Transition {
                        to: edge.to,
                        fetch_prices: edge.fetch_prices,
                    });
                }
            }
        }
        None
    }
}

impl Default for StepGraph {
    fn default() -> Self {
        Self::standard()
    }
}
