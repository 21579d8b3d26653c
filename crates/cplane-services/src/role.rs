//! ---
//! cp_section: "03-service-lifecycle"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Service naming and flag rendering conventions."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Control-plane services managed by the lifecycle engine.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    /// Distributed consensus store backing cluster state.
    Etcd,
    /// Controller manager reconciling cluster objects.
    KubeController,
}

impl ServiceRole {
    /// Fixed container name a service is tracked under on every host.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            ServiceRole::Etcd => "etcd",
            ServiceRole::KubeController => "kube-controller-manager",
        }
    }

    /// Plane label used in log breadcrumbs.
    #[must_use]
    pub const fn plane(self) -> &'static str {
        match self {
            ServiceRole::Etcd => "etcd",
            ServiceRole::KubeController => "controlplane",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Name an about-to-be-replaced container is parked under during an upgrade.
#[must_use]
pub fn rescue_name(canonical: &str) -> String {
    format!("old-{}", canonical)
}

/// Render caller-supplied flag overrides as `--key=value`, in declaration order.
///
/// Keys are not deduplicated against fixed flags; a colliding key simply
/// yields a second flag and the process's own flag semantics decide.
pub(crate) fn extra_flags(extra_args: &IndexMap<String, String>) -> Vec<String> {
    extra_args
        .iter()
        .map(|(arg, value)| format!("--{}={}", arg, value))
        .collect()
}
