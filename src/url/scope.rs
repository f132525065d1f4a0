use crate::config::DomainScope;
use crate::url::extract_host;
use url::Url;

/// Checks candidate URLs against the crawl's domain scope
///
/// Built once from the seed URL when a run starts; workers consult it for
/// every discovered link. The scope rules are:
///
/// - `SameHost`: the candidate host must equal the seed host exactly
/// - `SameDomain`: the seed host itself, or any subdomain of it
/// - `Unrestricted`: every HTTP(S) host is in scope
///
/// An explicit allow-list of extra hosts widens `SameHost` and
/// `SameDomain`; it is ignored under `Unrestricted`.
#[derive(Debug, Clone)]
pub struct ScopeMatcher {
    scope: DomainScope,
    seed_host: String,
    allowed_hosts: Vec<String>,
}

impl ScopeMatcher {
    /// Creates a matcher for the given seed URL
    ///
    /// Returns None if the seed has no host, which a normalized seed
    /// cannot.
    pub fn new(seed: &Url, scope: DomainScope, allowed_hosts: &[String]) -> Option<Self> {
        let seed_host = extract_host(seed)?;
        let allowed_hosts = allowed_hosts.iter().map(|h| h.to_lowercase()).collect();

        Some(Self {
            scope,
            seed_host,
            allowed_hosts,
        })
    }

    /// Returns true if the candidate URL is within the crawl scope
    pub fn in_scope(&self, candidate: &Url) -> bool {
        let host = match extract_host(candidate) {
            Some(h) => h,
            None => return false,
        };

        match self.scope {
            DomainScope::Unrestricted => true,
            DomainScope::SameHost => host == self.seed_host || self.explicitly_allowed(&host),
            DomainScope::SameDomain => {
                host == self.seed_host
                    || is_subdomain_of(&host, &self.seed_host)
                    || self.explicitly_allowed(&host)
            }
        }
    }

    /// The seed host this matcher was built from
    pub fn seed_host(&self) -> &str {
        &self.seed_host
    }

    fn explicitly_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|h| h == host)
    }
}

/// Checks whether `candidate` is a subdomain of `base`
///
/// Suffix match on a dot boundary, so "notexample.com" never matches
/// "example.com".
fn is_subdomain_of(candidate: &str, base: &str) -> bool {
    candidate
        .strip_suffix(base)
        .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(scope: DomainScope, allowed: &[&str]) -> ScopeMatcher {
        let seed = Url::parse("https://example.com/").unwrap();
        let allowed: Vec<String> = allowed.iter().map(|s| s.to_string()).collect();
        ScopeMatcher::new(&seed, scope, &allowed).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_same_host_accepts_seed_host() {
        let m = matcher(DomainScope::SameHost, &[]);
        assert!(m.in_scope(&url("https://example.com/page")));
    }

    #[test]
    fn test_same_host_rejects_subdomain() {
        let m = matcher(DomainScope::SameHost, &[]);
        assert!(!m.in_scope(&url("https://blog.example.com/page")));
    }

    #[test]
    fn test_same_host_rejects_other_host() {
        let m = matcher(DomainScope::SameHost, &[]);
        assert!(!m.in_scope(&url("https://other.com/page")));
    }

    #[test]
    fn test_same_domain_accepts_seed_host() {
        let m = matcher(DomainScope::SameDomain, &[]);
        assert!(m.in_scope(&url("https://example.com/page")));
    }

    #[test]
    fn test_same_domain_accepts_subdomain() {
        let m = matcher(DomainScope::SameDomain, &[]);
        assert!(m.in_scope(&url("https://blog.example.com/page")));
        assert!(m.in_scope(&url("https://api.v2.example.com/page")));
    }

    #[test]
    fn test_same_domain_rejects_lookalike() {
        let m = matcher(DomainScope::SameDomain, &[]);
        assert!(!m.in_scope(&url("https://notexample.com/page")));
        assert!(!m.in_scope(&url("https://example.com.evil.org/page")));
    }

    #[test]
    fn test_same_domain_rejects_other_host() {
        let m = matcher(DomainScope::SameDomain, &[]);
        assert!(!m.in_scope(&url("https://other.com/b")));
    }

    #[test]
    fn test_unrestricted_accepts_everything() {
        let m = matcher(DomainScope::Unrestricted, &[]);
        assert!(m.in_scope(&url("https://example.com/")));
        assert!(m.in_scope(&url("https://completely-unrelated.org/")));
    }

    #[test]
    fn test_allow_list_widens_same_host() {
        let m = matcher(DomainScope::SameHost, &["partner.org"]);
        assert!(m.in_scope(&url("https://partner.org/docs")));
        assert!(!m.in_scope(&url("https://other.com/")));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let m = matcher(DomainScope::SameHost, &["Partner.ORG"]);
        assert!(m.in_scope(&url("https://partner.org/docs")));
    }

    #[test]
    fn test_allow_list_is_exact_hosts() {
        let m = matcher(DomainScope::SameHost, &["partner.org"]);
        assert!(!m.in_scope(&url("https://sub.partner.org/docs")));
    }
}
