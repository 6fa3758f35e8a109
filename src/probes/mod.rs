// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vendor Protocol Probes
 * Builds one login request per vendor and classifies the response
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ProbeError;
use crate::types::Credential;

/// Cap on how much of a response body is read. Success and failure markers
/// sit near the top of the page, so a few KB is always enough.
pub const MAX_BODY_PREFIX: usize = 8192;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Closed set of supported gateway vendors. Adding a vendor means adding a
/// variant and its two match arms below; dispatch never goes through strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    Fortinet,
    GlobalProtect,
    SonicWall,
    Sophos,
    WatchGuard,
    Cisco,
    Citrix,
}

impl VendorKind {
    pub fn name(&self) -> &'static str {
        match self {
            VendorKind::Fortinet => "fortinet",
            VendorKind::GlobalProtect => "globalprotect",
            VendorKind::SonicWall => "sonicwall",
            VendorKind::Sophos => "sophos",
            VendorKind::WatchGuard => "watchguard",
            VendorKind::Cisco => "cisco",
            VendorKind::Citrix => "citrix",
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VendorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fortinet" => Ok(VendorKind::Fortinet),
            "globalprotect" => Ok(VendorKind::GlobalProtect),
            "sonicwall" => Ok(VendorKind::SonicWall),
            "sophos" => Ok(VendorKind::Sophos),
            "watchguard" => Ok(VendorKind::WatchGuard),
            "cisco" => Ok(VendorKind::Cisco),
            "citrix" => Ok(VendorKind::Citrix),
            other => Err(format!("unknown vendor type: {}", other)),
        }
    }
}

/// A fully built login attempt: target URL plus the form-encoded POST body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub url: String,
    pub form: String,
}

/// Percent-encode one form value.
fn enc(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Prefix `https://` when the spec carries no scheme. Custom ports like
/// `:4443` or `:10443` pass through untouched.
fn base_url(spec: &str) -> String {
    if spec.starts_with("http") {
        spec.to_string()
    } else {
        format!("https://{}", spec)
    }
}

/// Append a login path unless the spec already carries it.
fn with_path(mut url: String, path: &str) -> String {
    if url.contains(path) {
        return url;
    }
    if url.ends_with('/') {
        url.push_str(path.trim_start_matches('/'));
    } else {
        url.push_str(path);
    }
    url
}

/// SonicWall and Sophos lists may stash a domain after the password,
/// separated by `;`. A bare password means an empty domain.
fn split_password_domain(password: &str) -> (&str, &str) {
    let parts: Vec<&str> = password.split(';').collect();
    if parts.len() == 2 {
        (parts[0], parts[1])
    } else {
        (password, "")
    }
}

impl VendorKind {
    /// Build the vendor-specific login request for one credential.
    pub fn login_request(&self, cred: &Credential) -> Result<LoginRequest, ProbeError> {
        match self {
            VendorKind::Fortinet => Ok(LoginRequest {
                url: with_path(base_url(&cred.host_spec), "/remote/login"),
                form: format!(
                    "username={}&password={}",
                    enc(&cred.username),
                    enc(&cred.password)
                ),
            }),

            VendorKind::GlobalProtect => Ok(LoginRequest {
                url: with_path(base_url(&cred.host_spec), "/global-protect/login.esp"),
                form: format!(
                    "prot=https%&server={}&inputStr=&action=getsoftware&user={}&passwd={}&ok=Log+In",
                    enc(&cred.host_spec),
                    enc(&cred.username),
                    enc(&cred.password)
                ),
            }),

            VendorKind::SonicWall => {
                let (password, domain) = split_password_domain(&cred.password);
                Ok(LoginRequest {
                    url: with_path(base_url(&cred.host_spec), "/auth.html"),
                    form: format!(
                        "username={}&password={}&domain={}&login=Login",
                        enc(&cred.username),
                        enc(password),
                        enc(domain)
                    ),
                })
            }

            VendorKind::Sophos => {
                let (password, domain) = split_password_domain(&cred.password);
                Ok(LoginRequest {
                    url: with_path(
                        base_url(&cred.host_spec),
                        "/userportal/webpages/myaccount/login.jsp",
                    ),
                    form: format!(
                        "username={}&password={}&domain={}&loginBtn=Login",
                        enc(&cred.username),
                        enc(password),
                        enc(domain)
                    ),
                })
            }

            VendorKind::WatchGuard => {
                // Compound spec: ip:port:authType:domain:user:pass
                let parts: Vec<&str> = cred.host_spec.split(':').collect();
                if parts.len() < 6 {
                    return Err(ProbeError::InvalidHostSpec {
                        vendor: self.name(),
                        spec: cred.host_spec.clone(),
                        reason: "expected ip:port:authType:domain:user:pass",
                    });
                }
                let host = format!("{}:{}", parts[0], parts[1]);
                let auth_type = parts[2];
                let domain = parts[3];
                let username = parts[4];
                let password = parts[5];

                Ok(LoginRequest {
                    url: with_path(base_url(&host), "/auth.fcc"),
                    form: format!(
                        "domain={}&username={}&password={}&authType={}&login=Login",
                        enc(domain),
                        enc(username),
                        enc(password),
                        enc(auth_type)
                    ),
                })
            }

            VendorKind::Cisco => {
                // Compound spec: ip:port:user:pass[:group]
                let parts: Vec<&str> = cred.host_spec.split(':').collect();
                if parts.len() < 4 {
                    return Err(ProbeError::InvalidHostSpec {
                        vendor: self.name(),
                        spec: cred.host_spec.clone(),
                        reason: "expected ip:port:user:pass[:group]",
                    });
                }
                let host = format!("{}:{}", parts[0], parts[1]);
                let username = parts[2];
                let password = parts[3];
                let group = parts.get(4).copied().unwrap_or("");

                Ok(LoginRequest {
                    url: with_path(base_url(&host), "/+webvpn+/index.html"),
                    form: format!(
                        "username={}&password={}&group_list={}&Login=Logon",
                        enc(username),
                        enc(password),
                        enc(group)
                    ),
                })
            }

            VendorKind::Citrix => Ok(LoginRequest {
                url: format!("https://{}/p/u/doAuthentication.do", cred.host_spec),
                form: format!(
                    "login={}&passwd={}&savecredentials=false&nsg-x1-logon-button=Log+On&StateContext=bG9naW5zY2hlbWE9ZGVmYXVsdA%3D%3D",
                    enc(&cred.username),
                    enc(&cred.password)
                ),
            }),
        }
    }

    /// Decide whether a response indicates a successful login. Status 200
    /// plus any allow-listed marker counts; Fortinet additionally accepts a
    /// 301/302 whose Location points at a portal or tunnel.
    pub fn classify(&self, status: u16, body: &str, location: Option<&str>) -> bool {
        match self {
            VendorKind::Fortinet => {
                if status == 200 {
                    return contains_any(
                        body,
                        &[
                            "vpn/tunnel",
                            "/remote/fortisslvpn",
                            "tunnel_mode",
                            "sslvpn_login",
                            "forticlient_download",
                            "portal.html",
                            "welcome.html",
                            "fgt_lang",
                            "FortiGate",
                            "/remote/login?",
                            "sslvpn_portal",
                        ],
                    );
                }
                if status == 301 || status == 302 {
                    if let Some(location) = location {
                        return contains_any(location, &["portal", "tunnel", "sslvpn"]);
                    }
                }
                false
            }

            VendorKind::GlobalProtect => {
                status == 200
                    && contains_any(
                        body,
                        &[
                            "Download Windows 64 bit GlobalProtect agent",
                            "globalprotect/portal/css",
                            "portal-userauthcookie",
                            "GlobalProtect Portal",
                            "gp-portal",
                            "/global-protect/portal",
                            "PanGlobalProtect",
                            "clientDownload",
                            "hip-report",
                        ],
                    )
            }

            VendorKind::SonicWall => {
                status == 200
                    && contains_any(
                        body,
                        &[
                            "SonicWall",
                            "NetExtender",
                            "sslvpn",
                            "portal.html",
                            "welcome",
                            "logout",
                        ],
                    )
            }

            VendorKind::Sophos => {
                status == 200
                    && contains_any(
                        body,
                        &[
                            "Sophos",
                            "userportal",
                            "myaccount",
                            "welcome",
                            "logout",
                            "portal",
                        ],
                    )
            }

            VendorKind::WatchGuard => {
                status == 200
                    && contains_any(
                        body,
                        &[
                            "WatchGuard",
                            "Firebox",
                            "portal",
                            "welcome",
                            "logout",
                            "AuthPoint",
                        ],
                    )
            }

            VendorKind::Cisco => {
                status == 200
                    && ((body.contains("SSL VPN Service") && body.contains("webvpn_logout"))
                        || contains_any(
                            body,
                            &[
                                "/+CSCOE+/",
                                "webvpn_portal",
                                "Cisco Systems VPN Client",
                                "/+webvpn+/",
                                "anyconnect",
                                "ANYCONNECT",
                                "remote_access",
                            ],
                        ))
            }

            VendorKind::Citrix => {
                status == 200
                    && contains_any(
                        body,
                        &[
                            "<CredentialUpdateService>/p/a/getCredentialUpdateRequirements.do</CredentialUpdateService>",
                            "NetScaler Gateway",
                            "/vpn/index.html",
                            "citrix-logon",
                            "/logon/LogonPoint/",
                            "NSGateway",
                        ],
                    )
            }
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Verdict of one probe invocation: the classified success flag plus the
/// raw material it was derived from.
#[derive(Debug, Clone)]
pub struct ProbeVerdict {
    pub success: bool,
    pub status_code: u16,
    pub body_prefix: Vec<u8>,
}

/// Seam between the trial executor and the network. The engine only ever
/// talks to this trait, so tests can substitute a stub.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, cred: &Credential) -> Result<ProbeVerdict, ProbeError>;
}

/// Production prober: one pooled HTTP client, one vendor, no retries.
/// Redirects are never followed so the Location header stays inspectable,
/// and certificate validation is disabled by design (self-signed gateways).
pub struct HttpProber {
    client: reqwest::Client,
    vendor: VendorKind,
}

impl HttpProber {
    pub fn new(
        vendor: VendorKind,
        timeout: std::time::Duration,
        max_idle_per_host: usize,
        idle_timeout: std::time::Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client, vendor })
    }

    pub fn vendor(&self) -> VendorKind {
        self.vendor
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, cred: &Credential) -> Result<ProbeVerdict, ProbeError> {
        let request = self.vendor.login_request(cred)?;

        let mut response = self
            .client
            .post(&request.url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("User-Agent", USER_AGENT)
            .header("Connection", "close")
            .body(request.form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Capped read: markers live near the top of the page.
        let mut body = Vec::with_capacity(MAX_BODY_PREFIX);
        while let Some(chunk) = response.chunk().await? {
            let take = (MAX_BODY_PREFIX - body.len()).min(chunk.len());
            body.extend_from_slice(&chunk[..take]);
            if body.len() >= MAX_BODY_PREFIX {
                break;
            }
        }

        let text = String::from_utf8_lossy(&body);
        let success = self.vendor.classify(status, &text, location.as_deref());

        Ok(ProbeVerdict {
            success,
            status_code: status,
            body_prefix: body,
        })
    }
}
