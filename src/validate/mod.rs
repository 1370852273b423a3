//! Debounced field validation.
//!
//! A [`FieldValidator`] holds the rule list of every registered field and
//! reacts to the same events a browser form emits: keystrokes are debounced,
//! blur validates at once and focus clears the error.

pub mod documents;
pub mod form;
pub mod rules;

pub use self::documents::{
    detect_document_type, password_strength, validate_cep, validate_cnpj, validate_cpf,
    validate_email, validate_phone, DocumentType, PasswordStrength, StrengthLevel,
};
pub use self::form::{FieldDisplay, Form, FormHost};
pub use self::rules::Rule;

use crate::errors::ProcessedError;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError, Weak,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    pub debounce_delay: Duration,
    pub show_success_indicator: bool,
    pub clear_error_on_focus: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(300),
            show_success_indicator: true,
            clear_error_on_focus: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldState {
    pub is_valid: bool,
    pub error: Option<String>,
    /// Set once the field was validated with its result shown; later
    /// keystrokes then update the display live.
    pub has_been_validated: bool,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub field_states: BTreeMap<String, FieldState>,
    pub errors: BTreeMap<String, String>,
}

struct FieldEntry {
    rules: Vec<Rule>,
    state: FieldState,
    pending: Option<JoinHandle<()>>,
}

struct Inner {
    host: Arc<dyn FormHost>,
    config: ValidatorConfig,
    fields: Mutex<BTreeMap<String, FieldEntry>>,
    evaluations: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let fields = self.fields.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in fields.values_mut() {
            if let Some(pending) = entry.pending.take() {
                pending.abort();
            }
        }
    }
}

#[derive(Clone)]
pub struct FieldValidator {
    inner: Arc<Inner>,
}

impl FieldValidator {
    #[must_use]
    pub fn new(host: Arc<dyn FormHost>, config: ValidatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                fields: Mutex::new(BTreeMap::new()),
                evaluations: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn host(&self) -> &Arc<dyn FormHost> {
        &self.inner.host
    }

    fn fields(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, FieldEntry>> {
        self.inner
            .fields
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers (or replaces) the rule list of a field.
    pub fn add_field(&self, field_id: &str, rules: Vec<Rule>) {
        let previous = self.fields().insert(
            field_id.to_string(),
            FieldEntry {
                rules,
                state: FieldState::default(),
                pending: None,
            },
        );
        if let Some(pending) = previous.and_then(|entry| entry.pending) {
            pending.abort();
        }
        debug!(field = field_id, "validation rules registered");
    }

    pub fn remove_field(&self, field_id: &str) {
        if let Some(pending) = self.fields().remove(field_id).and_then(|entry| entry.pending) {
            pending.abort();
        }
    }

    /// How many times rules were evaluated, across all fields.
    #[must_use]
    pub fn evaluation_count(&self) -> u64 {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Runs the field's rules against its live value. The result is shown when
    /// `force_show` is set or the field was already validated visibly.
    /// Unregistered fields are valid.
    pub fn validate_field(&self, field_id: &str, force_show: bool) -> bool {
        let Some(rules) = self
            .fields()
            .get(field_id)
            .map(|entry| entry.rules.clone())
        else {
            return true;
        };

        let host = Arc::clone(&self.inner.host);
        let value = host.value(field_id).unwrap_or_default();
        let value = value.trim();
        let lookup = |other: &str| host.value(other);

        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);
        let failure = rules
            .iter()
            .find_map(|rule| rule.evaluate(value, &lookup).err());
        let is_valid = failure.is_none();

        let show = {
            let mut fields = self.fields();
            let Some(entry) = fields.get_mut(field_id) else {
                return is_valid;
            };
            let show = force_show || entry.state.has_been_validated;
            entry.state = FieldState {
                is_valid,
                error: failure.clone(),
                has_been_validated: entry.state.has_been_validated || force_show,
                value: value.to_string(),
            };
            show
        };

        trace!(field = field_id, is_valid, "field validated");

        let display = match failure {
            Some(message) if show => FieldDisplay::Error(message),
            Some(_) => FieldDisplay::Neutral,
            None if show && self.inner.config.show_success_indicator && !value.is_empty() => {
                FieldDisplay::Success
            }
            None => FieldDisplay::Neutral,
        };
        host.render(field_id, &display);

        is_valid
    }

    fn field_ids(&self, form_id: Option<&str>) -> Vec<String> {
        let ids: Vec<String> = self.fields().keys().cloned().collect();
        ids.into_iter()
            .filter(|id| {
                form_id.map_or(true, |form| {
                    self.inner.host.form_of(id).as_deref() == Some(form)
                })
            })
            .collect()
    }

    /// Validates every field (of one form, when given) and shows all errors.
    pub fn validate_form(&self, form_id: Option<&str>) -> bool {
        self.field_ids(form_id)
            .iter()
            .map(|id| self.validate_field(id, true))
            .fold(true, |all, valid| all && valid)
    }

    /// Keystroke: apply the live mask, then validate once typing pauses.
    pub fn on_input(&self, field_id: &str, value: &str) {
        let mask = self
            .fields()
            .get(field_id)
            .and_then(|entry| entry.rules.iter().find_map(Rule::input_mask));

        let value = mask.map_or_else(|| value.to_string(), |mask| mask(value));
        self.inner.host.set_value(field_id, &value);
        self.schedule(field_id);
    }

    pub fn on_change(&self, field_id: &str, value: &str) {
        self.on_input(field_id, value);
    }

    pub fn on_blur(&self, field_id: &str) -> bool {
        self.cancel_pending(field_id);
        self.validate_field(field_id, true)
    }

    pub fn on_focus(&self, field_id: &str) {
        if !self.inner.config.clear_error_on_focus {
            return;
        }
        let has_error = self
            .fields()
            .get(field_id)
            .is_some_and(|entry| entry.state.error.is_some());
        if has_error {
            self.inner.host.render(field_id, &FieldDisplay::Neutral);
        }
    }

    fn cancel_pending(&self, field_id: &str) {
        if let Some(pending) = self
            .fields()
            .get_mut(field_id)
            .and_then(|entry| entry.pending.take())
        {
            pending.abort();
        }
    }

    /// Restarts the quiet period of a field. Without a Tokio runtime the
    /// field is validated immediately.
    fn schedule(&self, field_id: &str) {
        self.cancel_pending(field_id);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.validate_field(field_id, false);
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.config.debounce_delay;
        let id = field_id.to_string();
        let task = handle.spawn(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                let validator = FieldValidator { inner };
                if let Some(entry) = validator.fields().get_mut(&id) {
                    entry.pending = None;
                }
                validator.validate_field(&id, false);
            }
        });

        let mut fields = self.fields();
        match fields.get_mut(field_id) {
            Some(entry) => entry.pending = Some(task),
            None => task.abort(),
        }
    }

    /// Resets state and display of every field (of one form, when given).
    pub fn clear_validations(&self, form_id: Option<&str>) {
        for id in self.field_ids(form_id) {
            self.cancel_pending(&id);
            if let Some(entry) = self.fields().get_mut(&id) {
                entry.state = FieldState::default();
            }
            self.inner.host.render(&id, &FieldDisplay::Neutral);
        }
    }

    #[must_use]
    pub fn validation_state(&self) -> BTreeMap<String, FieldState> {
        self.fields()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.state.clone()))
            .collect()
    }

    /// Validates a form and returns the outcome of every field.
    pub fn validate_and_report(&self, form_id: Option<&str>) -> ValidationReport {
        let is_valid = self.validate_form(form_id);
        let ids = self.field_ids(form_id);
        let states = self.validation_state();

        let field_states: BTreeMap<String, FieldState> = states
            .into_iter()
            .filter(|(id, _)| ids.contains(id))
            .collect();
        let errors = field_states
            .iter()
            .filter_map(|(id, state)| state.error.clone().map(|error| (id.clone(), error)))
            .collect();

        ValidationReport {
            is_valid,
            field_states,
            errors,
        }
    }

    /// Shows the first server-side message of each registered field.
    /// Returns how many fields were marked.
    pub fn apply_server_errors(&self, error: &ProcessedError) -> usize {
        let mut applied = 0;
        for (field_id, messages) in &error.field_errors {
            let Some(message) = messages.first() else {
                continue;
            };
            {
                let mut fields = self.fields();
                let Some(entry) = fields.get_mut(field_id) else {
                    continue;
                };
                entry.state.is_valid = false;
                entry.state.error = Some(message.clone());
                entry.state.has_been_validated = true;
            }
            self.inner
                .host
                .render(field_id, &FieldDisplay::Error(message.clone()));
            applied += 1;
        }
        applied
    }

    /// Rules of the sign-up form (`/cadastro`).
    pub fn setup_signup_form(&self) {
        let name = || {
            vec![
                Rule::Required,
                Rule::MinLength(2),
                Rule::MaxLength(rules::DEFAULT_MAX_LENGTH),
            ]
        };
        self.add_field("first_name", name());
        self.add_field("last_name", name());
        self.add_field("email", vec![Rule::Required, Rule::Email]);
        self.add_field("password", vec![Rule::Required, Rule::password()]);
        self.add_field(
            "password_confirm",
            vec![Rule::Required, Rule::confirm("password")],
        );
        self.add_field("cpf", vec![Rule::Required, Rule::Cpf]);
        self.add_field("telefone", vec![Rule::Phone]);
    }

    /// Rules of the login form.
    pub fn setup_login_form(&self) {
        self.add_field("email", vec![Rule::Required, Rule::Email]);
        self.add_field("password", vec![Rule::Required]);
    }
}
