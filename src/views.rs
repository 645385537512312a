//! HTML pages, embedded at compile time and rendered with minijinja.

use minijinja::{Environment, context};
use serde::Serialize;

use crate::error::Result;
use crate::store::HistoryEntry;

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("demo.html", include_str!("../templates/demo.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("contacts.html", include_str!("../templates/contacts.html")),
];

/// Three hidden fields carried between wizard steps by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub invisible_item1: String,
    pub invisible_item2: String,
    pub invisible_item3: String,
}

impl WizardState {
    /// What a first visit renders.
    pub fn blank() -> Self {
        Self {
            invisible_item1: " ".into(),
            invisible_item2: " ".into(),
            invisible_item3: " ".into(),
        }
    }

    /// Newest reply first; the oldest slot falls off.
    pub fn push(self, reply: String) -> Self {
        Self {
            invisible_item1: reply,
            invisible_item2: self.invisible_item1,
            invisible_item3: self.invisible_item2,
        }
    }
}

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }

    pub fn index(&self, state: &WizardState) -> Result<String> {
        self.render("index.html", state)
    }

    pub fn demo(&self, reply: Option<&str>, download: Option<&str>) -> Result<String> {
        self.render("demo.html", context! { response => reply, download => download })
    }

    pub fn dashboard(&self, history: &[HistoryEntry]) -> Result<String> {
        self.render("dashboard.html", context! { history => history })
    }

    pub fn contacts(&self) -> Result<String> {
        self.render("contacts.html", context! {})
    }
}
