//! Ordered catalogs of forward and compensation steps.
//!
//! The backend owns the step vocabulary and has renamed steps between
//! releases, so the catalog is data: [`StepRegistry::default`] carries the
//! current order buy saga and [`StepRegistry::from_json`] loads an override.
//! Aliases map alternative spellings (older names, the orchestrator's
//! `COMP_`-prefixed compensation ids) onto one canonical id.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::compensation::CompensationPathResolver;
use crate::error::RegistryError;
use crate::saga::{StepId, steps};

/// One step of a saga path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: StepId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<StepId>,
}

impl StepDefinition {
    /// Creates a step with no aliases.
    pub fn new(id: impl Into<StepId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            aliases: Vec::new(),
        }
    }

    /// Adds an alternative id that resolves to this step.
    pub fn with_alias(mut self, alias: impl Into<StepId>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Which catalog a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepPath {
    Forward,
    Compensation,
}

#[derive(Deserialize)]
struct RegistryDocument {
    forward: Vec<StepDefinition>,
    compensation: Vec<StepDefinition>,
}

/// Static, ordered lookup of the saga's steps.
#[derive(Debug, Clone)]
pub struct StepRegistry {
    forward: Vec<StepDefinition>,
    compensation: Vec<StepDefinition>,
    /// Canonical id or alias -> (path, position).
    index: HashMap<String, (StepPath, usize)>,
}

impl StepRegistry {
    /// Builds a registry, rejecting empty paths and ambiguous ids.
    pub fn new(
        forward: Vec<StepDefinition>,
        compensation: Vec<StepDefinition>,
    ) -> Result<Self, RegistryError> {
        if forward.is_empty() {
            return Err(RegistryError::EmptyPath(StepPath::Forward));
        }
        if compensation.is_empty() {
            return Err(RegistryError::EmptyPath(StepPath::Compensation));
        }

        let mut index = HashMap::new();
        for (path, definitions) in [
            (StepPath::Forward, &forward),
            (StepPath::Compensation, &compensation),
        ] {
            for (position, definition) in definitions.iter().enumerate() {
                for key in std::iter::once(&definition.id).chain(&definition.aliases) {
                    if index
                        .insert(key.as_str().to_string(), (path, position))
                        .is_some()
                    {
                        return Err(RegistryError::DuplicateId(key.clone()));
                    }
                }
            }
        }

        Ok(Self {
            forward,
            compensation,
            index,
        })
    }

    /// Loads a registry from `{ "forward": [...], "compensation": [...] }`.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument = serde_json::from_str(json)?;
        Self::new(document.forward, document.compensation)
    }

    /// Forward steps in execution order.
    pub fn forward(&self) -> &[StepDefinition] {
        &self.forward
    }

    /// Compensation steps in execution order.
    pub fn compensation(&self) -> &[StepDefinition] {
        &self.compensation
    }

    /// Canonical ids of the forward path, in order.
    pub fn forward_ids(&self) -> Vec<StepId> {
        self.forward.iter().map(|d| d.id.clone()).collect()
    }

    /// Looks up a step by canonical id or alias.
    pub fn definition(&self, id: &str) -> Option<&StepDefinition> {
        self.index.get(id).map(|&(path, position)| match path {
            StepPath::Forward => &self.forward[position],
            StepPath::Compensation => &self.compensation[position],
        })
    }

    /// Returns the path a step id (or alias) belongs to.
    pub fn path_of(&self, id: &str) -> Option<StepPath> {
        self.index.get(id).map(|&(path, _)| path)
    }

    /// Maps an id or alias to its canonical id.
    pub fn canonicalize(&self, id: &str) -> Option<&StepId> {
        self.definition(id).map(|d| &d.id)
    }

    /// Canonicalises a batch of reported step ids.
    ///
    /// Unknown ids are kept verbatim; they belong to no path and are never
    /// revealed, but dropping them would hide backend vocabulary drift.
    pub fn canonical_set<'a, I>(&self, ids: I) -> BTreeSet<StepId>
    where
        I: IntoIterator<Item = &'a StepId>,
    {
        ids.into_iter()
            .map(|id| {
                self.canonicalize(id.as_str())
                    .cloned()
                    .unwrap_or_else(|| id.clone())
            })
            .collect()
    }

    /// Compensation steps the backend will run for the given forward
    /// progress, as registry entries.
    ///
    /// Chain ids that this catalog does not know are skipped.
    pub fn compensation_chain(&self, completed: &BTreeSet<StepId>) -> Vec<&StepDefinition> {
        CompensationPathResolver::resolve(completed)
            .iter()
            .filter_map(|id| self.definition(id.as_str()))
            .filter(|d| self.path_of(d.id.as_str()) == Some(StepPath::Compensation))
            .collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        let forward = vec![
            StepDefinition::new(steps::CREATE_ORDER, "Create Order"),
            StepDefinition::new(steps::VERIFY_TRADING_PERMISSION, "Verify Permission"),
            StepDefinition::new(steps::VERIFY_ACCOUNT_STATUS, "Verify Account"),
            StepDefinition::new(steps::VALIDATE_STOCK, "Validate Stock"),
            StepDefinition::new(steps::GET_MARKET_PRICE, "Get Price"),
            StepDefinition::new(steps::CALCULATE_REQUIRED_FUNDS, "Calculate Funds"),
            StepDefinition::new(steps::RESERVE_FUNDS, "Reserve Funds"),
            StepDefinition::new(steps::UPDATE_ORDER_VALIDATED, "Validate Order"),
            StepDefinition::new(steps::SUBMIT_ORDER, "Execute Order").with_alias("EXECUTE_ORDER"),
            StepDefinition::new(steps::UPDATE_ORDER_EXECUTED, "Update Order"),
            StepDefinition::new(steps::UPDATE_PORTFOLIO, "Update Portfolio"),
            StepDefinition::new(steps::SETTLE_TRANSACTION, "Settle Transaction"),
            StepDefinition::new(steps::UPDATE_ORDER_COMPLETED, "Complete Order"),
            StepDefinition::new(steps::COMPLETE_SAGA, "Complete"),
        ];
        let compensation = [
            (steps::REVERSE_SETTLEMENT, "Reverse Settlement"),
            (steps::REMOVE_POSITIONS, "Remove Positions"),
            (steps::CANCEL_BROKER_ORDER, "Cancel Broker Order"),
            (steps::RELEASE_FUNDS, "Release Reserved Funds"),
            (steps::CANCEL_ORDER, "Cancel Order"),
        ]
        .into_iter()
        .map(|(id, name)| StepDefinition::new(id, name).with_alias(format!("COMP_{id}")))
        .collect();

        match Self::new(forward, compensation) {
            Ok(registry) => registry,
            // The built-in catalog has no duplicates and no empty path.
            Err(e) => unreachable!("built-in step registry is invalid: {e}"),
        }
    }
}
