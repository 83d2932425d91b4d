use super::non_empty;

/// A cast member. Lower `sort_order` means a more prominent billing.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    id: String,
    name: String,
    role: Option<String>,
    artwork_url: Option<String>,
    sort_order: i32,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: None,
            artwork_url: None,
            sort_order,
        }
    }

    pub fn with_role(mut self, role: Option<String>) -> Self {
        self.role = non_empty(role);
        self
    }

    pub fn with_artwork_url(mut self, url: Option<String>) -> Self {
        self.artwork_url = non_empty(url);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Real name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Character name.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }

    pub fn sort_order(&self) -> i32 {
        self.sort_order
    }
}
