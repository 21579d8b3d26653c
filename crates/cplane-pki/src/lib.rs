//! ---
//! cp_section: "04-security-pki"
//! cp_subsection: "module"
//! cp_type: "source"
//! cp_scope: "code"
//! cp_description: "Well-known certificate and kubeconfig locations."
//! cp_version: "v0.0.0-prealpha"
//! cp_owner: "tbd"
//! ---
//! Fixed filesystem layout for cluster PKI material.
//!
//! Certificate generation and distribution happen outside this workspace; the
//! services only need to agree on where the material lives once it has been
//! placed on a host. Every path is inside `/etc/kubernetes`, which the
//! control-plane containers bind-mount, so the same string is valid on the
//! host and inside the container.

#![warn(missing_docs)]

/// Directory holding all generated certificates, keys, and kubeconfigs.
pub const CERTS_DIR: &str = "/etc/kubernetes/ssl";

/// Cluster certificate-authority certificate.
pub const CA_CERT_PATH: &str = "/etc/kubernetes/ssl/ca.pem";

/// API-server private key, doubling as the service-account signing key.
pub const KUBE_API_KEY_PATH: &str = "/etc/kubernetes/ssl/kube-apiserver-key.pem";

/// Client kubeconfig for the controller manager.
pub const KUBE_CONTROLLER_CONFIG_PATH: &str =
    "/etc/kubernetes/ssl/kubecfg-kube-controller-manager.yaml";

/// Path of the client kubeconfig generated for a named component.
pub fn kubeconfig_path(component: &str) -> String {
    format!("{}/kubecfg-{}.yaml", CERTS_DIR, component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_kubeconfig_matches_helper() {
        assert_eq!(
            kubeconfig_path("kube-controller-manager"),
            KUBE_CONTROLLER_CONFIG_PATH
        );
    }

    #[test]
    fn everything_lives_under_the_certs_dir() {
        for path in [CA_CERT_PATH, KUBE_API_KEY_PATH, KUBE_CONTROLLER_CONFIG_PATH] {
            assert!(path.starts_with(CERTS_DIR));
        }
    }
}
