//! Configuration validation.
//!
//! Validation runs on the fully deserialized [`GreenwaveConfig`] and
//! collects ALL errors and warnings rather than stopping at the first.
//! Warnings describe inconsistencies the engine tolerates at runtime
//! (they are ignored and logged once), errors describe parameters no
//! safe default can stand in for.

use std::collections::HashSet;

use crate::config::loader::ConfigLimits;
use crate::config::schema::{GreenwaveConfig, OperationMode, SchoolPolicy};
use crate::error::{Severity, ValidationIssue};
use crate::model::{IntersectionId, PhaseGroup};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(
        &mut self,
        config: &GreenwaveConfig,
        limits: &ConfigLimits,
    ) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_controller(config);
        self.validate_intersections(config, limits);
        self.validate_school_priority(config);
        self.validate_route(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Controller Parameters
    // ========================================================================

    fn validate_controller(&mut self, config: &GreenwaveConfig) {
        let c = &config.controller;

        self.require_non_negative("controller.base_duration", c.base_duration);
        self.require_non_negative("controller.extension_factor", c.extension_factor);
        self.require_non_negative("controller.max_extension", c.max_extension);
        self.require_positive("controller.emergency_duration", c.emergency_duration);
        self.require_positive("controller.cycle_length", c.cycle_length);

        if c.operation_mode == OperationMode::ExternalAgent && config.route.is_none() {
            self.add_warning(
                "controller.operation_mode",
                "external_agent mode without a 'route'; an agent must be attached programmatically \
                 or every cycle degrades to the reactive strategy",
            );
        }

        if c.operation_mode == OperationMode::LearnedDuration {
            self.add_warning(
                "controller.operation_mode",
                "learned_duration mode requires an attached duration predictor; \
                 cycles without one degrade to the reactive strategy",
            );
        }
    }

    // ========================================================================
    // Intersections
    // ========================================================================

    fn validate_intersections(&mut self, config: &GreenwaveConfig, limits: &ConfigLimits) {
        if config.intersections.len() > limits.max_intersections {
            self.add_error(
                "intersections",
                &format!(
                    "Too many intersections: {} (limit: {})",
                    config.intersections.len(),
                    limits.max_intersections
                ),
            );
        }

        for (id, layout) in &config.intersections {
            let path = format!("intersections.{id}.roads");

            if id.as_str().trim().is_empty() {
                self.add_error("intersections", "Intersection id cannot be empty");
            }

            if layout.roads.is_empty() {
                self.add_error(&path, "An intersection must control at least one road");
                continue;
            }

            let mut seen = HashSet::new();
            for road in &layout.roads {
                if !seen.insert(*road) {
                    self.add_error(&path, &format!("Duplicate road '{road}'"));
                }
            }

            for group in PhaseGroup::BOTH {
                if !layout.serves(group) {
                    self.add_error(
                        &path,
                        &format!(
                            "No road of phase {group} is controlled; selecting that phase \
                             would leave every road red"
                        ),
                    );
                }
            }
        }
    }

    // ========================================================================
    // School Priority
    // ========================================================================

    fn validate_school_priority(&mut self, config: &GreenwaveConfig) {
        let Some(school) = &config.school_priority else {
            return;
        };

        if school.start == school.end {
            self.add_error(
                "school_priority",
                "Window start and end are equal; the window would never be active",
            );
        }

        if let SchoolPolicy::Multiplier { factor } = school.policy {
            self.require_positive("school_priority.policy.factor", factor);
        }

        if !config.knows_intersection(&school.intersection) {
            let message = unknown_intersection_message(config, &school.intersection);
            self.add_warning(
                "school_priority.intersection",
                &format!("{message}; the school window will be ignored"),
            );
        }
    }

    // ========================================================================
    // Route
    // ========================================================================

    fn validate_route(&mut self, config: &GreenwaveConfig) {
        let Some(route) = &config.route else {
            return;
        };

        self.require_non_negative("route.duration", route.duration);

        for (label, endpoint) in [("start", &route.start), ("end", &route.end)] {
            let path = format!("route.{label}.intersection");

            if endpoint.intersection.position().is_none() {
                self.add_warning(
                    &path,
                    &format!(
                        "Route endpoint '{}' is not numeric; the route agent will produce no \
                         recommendations",
                        endpoint.intersection
                    ),
                );
            } else if !config.knows_intersection(&endpoint.intersection) {
                let message = unknown_intersection_message(config, &endpoint.intersection);
                self.add_warning(&path, &message);
            }
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn require_non_negative(&mut self, path: &str, value: f64) {
        if !value.is_finite() || value < 0.0 {
            self.add_error(
                path,
                &format!("Value {value} must be a finite, non-negative number"),
            );
        }
    }

    fn require_positive(&mut self, path: &str, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            self.add_error(
                path,
                &format!("Value {value} must be a finite, positive number"),
            );
        }
    }

    /// Adds an error to the collection.
    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    /// Adds a warning to the collection.
    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds an "unknown intersection" message with a close-match suggestion.
pub(crate) fn unknown_intersection_message(
    config: &GreenwaveConfig,
    id: &IntersectionId,
) -> String {
    let suggestion = config
        .intersections
        .keys()
        .map(|known| (known, strsim::damerau_levenshtein(id.as_str(), known.as_str())))
        .filter(|(_, distance)| *distance <= 2)
        .min_by_key(|(_, distance)| *distance)
        .map(|(known, _)| known);

    match suggestion {
        Some(known) => {
            format!("Unknown intersection '{id}' (did you mean '{known}'?)")
        }
        None => format!("Unknown intersection '{id}'"),
    }
}

// ============================================================================
// Tests
// ============================================================================
