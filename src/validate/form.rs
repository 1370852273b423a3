//! The DOM side of validation: where field values come from and how error or
//! success state is shown. [`Form`] keeps the same state in memory, including
//! the CSS classes a browser field would carry.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, PoisonError},
};

pub const ERROR_CLASSES: [&str; 2] = ["border-red-500", "focus:ring-red-500"];
pub const SUCCESS_CLASSES: [&str; 2] = ["border-green-500", "focus:ring-green-500"];
pub const NEUTRAL_CLASSES: [&str; 2] = ["border-gray-300", "focus:ring-blue-500"];
pub const ERROR_MESSAGE_CLASS: &str = "field-error-message";
pub const SUCCESS_ICON_CLASS: &str = "validation-success-icon";

/// What a field should look like after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldDisplay {
    Neutral,
    Error(String),
    Success,
}

pub trait FormHost: Send + Sync {
    /// Live value of a field, `None` if the field does not exist.
    fn value(&self, field_id: &str) -> Option<String>;

    fn set_value(&self, field_id: &str, value: &str);

    /// Id of the form enclosing the field.
    fn form_of(&self, field_id: &str) -> Option<String>;

    fn render(&self, field_id: &str, display: &FieldDisplay);
}

#[derive(Clone, Debug, Default)]
struct Field {
    value: String,
    form: Option<String>,
    classes: BTreeSet<String>,
    error_message: Option<String>,
    success_icon: bool,
}

/// In-memory form fields keyed by id.
#[derive(Default)]
pub struct Form {
    fields: Mutex<BTreeMap<String, Field>>,
}

impl Form {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field to a form, starting with the neutral look.
    pub fn add_field(&self, field_id: &str, form_id: Option<&str>) {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.insert(
            field_id.to_string(),
            Field {
                form: form_id.map(str::to_string),
                classes: NEUTRAL_CLASSES.iter().map(|c| (*c).to_string()).collect(),
                ..Field::default()
            },
        );
    }

    #[must_use]
    pub fn classes(&self, field_id: &str) -> Vec<String> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields
            .get(field_id)
            .map(|field| field.classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, field_id: &str, class: &str) -> bool {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields
            .get(field_id)
            .is_some_and(|field| field.classes.contains(class))
    }

    /// Text of the visible `field-error-message` element, if any.
    #[must_use]
    pub fn error_message(&self, field_id: &str) -> Option<String> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.get(field_id).and_then(|field| field.error_message.clone())
    }

    #[must_use]
    pub fn success_icon_visible(&self, field_id: &str) -> bool {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.get(field_id).is_some_and(|field| field.success_icon)
    }
}

fn swap_classes(classes: &mut BTreeSet<String>, add: &[&str], remove: &[&[&str]]) {
    for group in remove {
        for class in *group {
            classes.remove(*class);
        }
    }
    classes.extend(add.iter().map(|c| (*c).to_string()));
}

impl FormHost for Form {
    fn value(&self, field_id: &str) -> Option<String> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.get(field_id).map(|field| field.value.clone())
    }

    fn set_value(&self, field_id: &str, value: &str) {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(field) = fields.get_mut(field_id) {
            field.value = value.to_string();
        }
    }

    fn form_of(&self, field_id: &str) -> Option<String> {
        let fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        fields.get(field_id).and_then(|field| field.form.clone())
    }

    fn render(&self, field_id: &str, display: &FieldDisplay) {
        let mut fields = self.fields.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(field) = fields.get_mut(field_id) else {
            return;
        };

        match display {
            FieldDisplay::Error(message) => {
                swap_classes(
                    &mut field.classes,
                    &ERROR_CLASSES,
                    &[&NEUTRAL_CLASSES, &SUCCESS_CLASSES],
                );
                field.error_message = Some(message.clone());
                field.success_icon = false;
            }
            FieldDisplay::Success => {
                swap_classes(
                    &mut field.classes,
                    &SUCCESS_CLASSES,
                    &[&NEUTRAL_CLASSES, &ERROR_CLASSES],
                );
                field.error_message = None;
                field.success_icon = true;
            }
            FieldDisplay::Neutral => {
                swap_classes(
                    &mut field.classes,
                    &NEUTRAL_CLASSES,
                    &[&ERROR_CLASSES, &SUCCESS_CLASSES],
                );
                field.error_message = None;
                field.success_icon = false;
            }
        }
    }
}
