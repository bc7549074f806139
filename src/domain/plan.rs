use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    Professional,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Starter => "starter",
            Plan::Professional => "professional",
            Plan::Enterprise => "enterprise",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Starter => "Starter",
            Plan::Professional => "Professional",
            Plan::Enterprise => "Enterprise",
        }
    }

    /// `None` means unlimited.
    pub fn max_active_document_types(&self) -> Option<usize> {
        match self {
            Plan::Free => Some(1),
            Plan::Starter => Some(5),
            Plan::Professional => Some(10),
            Plan::Enterprise => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Free)
    }

    pub fn allows_sms(&self) -> bool {
        self.is_paid()
    }

    /// Whether one more document type may be activated when `active` are already on.
    pub fn can_activate_another(&self, active: usize) -> bool {
        self.max_active_document_types()
            .map(|limit| active < limit)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_limits() {
        assert_eq!(Plan::Free.max_active_document_types(), Some(1));
        assert_eq!(Plan::Starter.max_active_document_types(), Some(5));
        assert_eq!(Plan::Professional.max_active_document_types(), Some(10));
        assert_eq!(Plan::Enterprise.max_active_document_types(), None);
    }

    #[test]
    fn test_can_activate_another() {
        assert!(Plan::Free.can_activate_another(0));
        assert!(!Plan::Free.can_activate_another(1));
        assert!(Plan::Starter.can_activate_another(4));
        assert!(!Plan::Starter.can_activate_another(5));
        assert!(Plan::Enterprise.can_activate_another(500));
    }

    #[test]
    fn test_sms_and_names() {
        assert_eq!(Plan::Starter.as_str(), "starter");
        assert_eq!(Plan::Professional.label(), "Professional");
        assert!(!Plan::Free.allows_sms());
        assert!(Plan::Professional.allows_sms());
    }
}
