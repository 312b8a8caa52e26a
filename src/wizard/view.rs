//! Rendered step output

use crate::pagination::PageTokens;
use crate::token::{encode, Base, ControlKind, StepState, TokenError};
use serde::Serialize;

/// Platform limit on options in one select control
pub const MAX_SELECT_OPTIONS: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStyle {
    #[default]
    Secondary,
    Primary,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One clickable control and the token it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    pub label: String,
    pub token: String,
    pub kind: ControlKind,
    pub style: ControlStyle,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Selects only: how many options may be picked at once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<usize>,
}

/// What a step shows: text plus an ordered list of controls
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WizardView {
    pub content: String,
    pub controls: Vec<Control>,
}

impl WizardView {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            controls: Vec::new(),
        }
    }

    pub fn button(self, label: impl Into<String>, base: &Base, state: &StepState) -> Result<Self, TokenError> {
        self.styled_button(label, ControlStyle::Secondary, base, state)
    }

    pub fn styled_button(
        mut self,
        label: impl Into<String>,
        style: ControlStyle,
        base: &Base,
        state: &StepState,
    ) -> Result<Self, TokenError> {
        let token = encode(base, state)?;
        self.controls.push(Control {
            label: label.into(),
            token,
            kind: ControlKind::Button,
            style,
            options: Vec::new(),
            max_values: None,
        });
        Ok(self)
    }

    /// Select control; options beyond the platform limit are dropped.
    pub fn select(
        mut self,
        placeholder: impl Into<String>,
        base: &Base,
        state: &StepState,
        mut options: Vec<SelectOption>,
        max_values: usize,
    ) -> Result<Self, TokenError> {
        let token = encode(base, state)?;
        options.truncate(MAX_SELECT_OPTIONS);
        let max_values = max_values.clamp(1, options.len().max(1));
        self.controls.push(Control {
            label: placeholder.into(),
            token,
            kind: ControlKind::Select,
            style: ControlStyle::Secondary,
            options,
            max_values: Some(max_values),
        });
        Ok(self)
    }

    /// "Back" control re-encoding the parent step with the subset of state
    /// it understands.
    pub fn back(self, parent: &Base, state: &StepState, keep: &[&str]) -> Result<Self, TokenError> {
        self.button("Back", parent, &state.project(keep))
    }

    /// Previous/next controls for a paginated listing.
    #[must_use]
    pub fn page_controls(mut self, tokens: PageTokens) -> Self {
        for (label, token) in [("Previous", tokens.prev), ("Next", tokens.next)] {
            if let Some(token) = token {
                self.controls.push(Control {
                    label: label.to_string(),
                    token,
                    kind: ControlKind::Button,
                    style: ControlStyle::Secondary,
                    options: Vec::new(),
                    max_values: None,
                });
            }
        }
        self
    }

    pub fn control(&self, label: &str) -> Option<&Control> {
        self.controls.iter().find(|c| c.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModalField {
    /// State key the submitted value is merged under
    pub key: String,
    pub label: String,
    pub required: bool,
    pub max_length: usize,
}

/// Free-text input sub-step. Submitting it resumes the flow at the modal's own
/// token with the field values merged into the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModalView {
    pub title: String,
    pub token: String,
    pub fields: Vec<ModalField>,
}

impl ModalView {
    pub fn new(title: impl Into<String>, base: &Base, state: &StepState) -> Result<Self, TokenError> {
        Ok(Self {
            title: title.into(),
            token: encode(base, state)?,
            fields: Vec::new(),
        })
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, label: impl Into<String>, max_length: usize) -> Self {
        self.fields.push(ModalField {
            key: key.into(),
            label: label.into(),
            required: true,
            max_length,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::decode;

    #[test]
    fn back_control_projects_state_onto_parent() {
        let state = StepState::new().with("f", "all").with("a", 50);
        let view = WizardView::new("pick a channel")
            .back(&Base::button("purge", "filter"), &state, &["f"])
            .unwrap();

        let back = decode(&view.control("Back").unwrap().token).unwrap();
        assert_eq!(back.base, Base::button("purge", "filter"));
        assert_eq!(back.state, StepState::new().with("f", "all"));
    }

    #[test]
    fn select_truncates_to_platform_limit() {
        let options = (0..40).map(|i| SelectOption::new(format!("r{i}"), i.to_string())).collect();
        let view = WizardView::new("x")
            .select("pick", &Base::select("roles", "exclude"), &StepState::new(), options, 99)
            .unwrap();
        let control = &view.controls[0];
        assert_eq!(control.options.len(), MAX_SELECT_OPTIONS);
        assert_eq!(control.max_values, Some(MAX_SELECT_OPTIONS));
    }

    #[test]
    fn oversized_state_fails_the_render() {
        let state = StepState::new().with("p", "z".repeat(200));
        let result = WizardView::new("x").button("go", &Base::button("purge", "go"), &state);
        assert!(matches!(result, Err(TokenError::TooLong { .. })));
    }
}
