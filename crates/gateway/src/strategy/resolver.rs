//! Built-in resolvers: `host`, `path`, `vpath` and `grpc`.

use axum::http::request::Parts;

use super::{request_host, Endpoint, ResolveError, Resolver, ResolverOptions};

/// Split the request path into segments, rejecting the bare root.
fn path_segments(path: &str) -> Result<Vec<&str>, ResolveError> {
    match path.strip_prefix('/') {
        Some(rest) if !rest.is_empty() => Ok(rest.split('/').collect()),
        _ => Err(ResolveError::UnknownName(path.to_owned())),
    }
}

/// Join `parts` with dots, prefixed by the namespace when one is configured.
fn qualify(opts: &ResolverOptions, parts: &[&str]) -> String {
    match opts.namespace() {
        Some(ns) if !ns.is_empty() => {
            let mut name = ns.to_owned();
            for part in parts {
                name.push('.');
                name.push_str(part);
            }
            name
        }
        _ => parts.join("."),
    }
}

/// `v1`, `v2`, ... path segments.
pub(crate) fn is_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

// ---------------------------------------------------------------------------
// host
// ---------------------------------------------------------------------------

/// Resolves the request host as the service name.
#[derive(Debug)]
pub struct HostResolver {
    opts: ResolverOptions,
}

impl HostResolver {
    pub fn new(opts: ResolverOptions) -> Self {
        Self { opts }
    }
}

impl Resolver for HostResolver {
    fn kind(&self) -> &str {
        "host"
    }

    fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    fn resolve(&self, req: &Parts) -> Result<Endpoint, ResolveError> {
        Ok(Endpoint::from_parts(request_host(req), req))
    }
}

// ---------------------------------------------------------------------------
// path
// ---------------------------------------------------------------------------

/// Resolves `/foo/...` to `namespace.foo`.
#[derive(Debug)]
pub struct PathResolver {
    opts: ResolverOptions,
}

impl PathResolver {
    pub fn new(opts: ResolverOptions) -> Self {
        Self { opts }
    }
}

impl Resolver for PathResolver {
    fn kind(&self) -> &str {
        "path"
    }

    fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    fn resolve(&self, req: &Parts) -> Result<Endpoint, ResolveError> {
        let parts = path_segments(req.uri.path())?;
        Ok(Endpoint::from_parts(qualify(&self.opts, &parts[..1]), req))
    }
}

// ---------------------------------------------------------------------------
// vpath
// ---------------------------------------------------------------------------

/// Version-aware path resolver.
///
/// `/v1/foo/bar` resolves to `namespace.v1.foo`, anything else to
/// `namespace.<first segment>`.
#[derive(Debug)]
pub struct VpathResolver {
    opts: ResolverOptions,
}

impl VpathResolver {
    pub fn new(opts: ResolverOptions) -> Self {
        Self { opts }
    }
}

impl Resolver for VpathResolver {
    fn kind(&self) -> &str {
        "vpath"
    }

    fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    fn resolve(&self, req: &Parts) -> Result<Endpoint, ResolveError> {
        let parts = path_segments(req.uri.path())?;
        let take = if parts.len() > 1 && is_version(parts[0]) { 2 } else { 1 };
        Ok(Endpoint::from_parts(qualify(&self.opts, &parts[..take]), req))
    }
}

// ---------------------------------------------------------------------------
// grpc
// ---------------------------------------------------------------------------

/// Resolves gRPC paths: `/greeter.Greeter/Hello` → `greeter`.
///
/// gRPC service names are already fully qualified, so no namespace is applied.
#[derive(Debug)]
pub struct GrpcResolver {
    opts: ResolverOptions,
}

impl GrpcResolver {
    pub fn new(opts: ResolverOptions) -> Self {
        Self { opts }
    }
}

impl Resolver for GrpcResolver {
    fn kind(&self) -> &str {
        "grpc"
    }

    fn options(&self) -> &ResolverOptions {
        &self.opts
    }

    fn resolve(&self, req: &Parts) -> Result<Endpoint, ResolveError> {
        let parts = path_segments(req.uri.path())?;
        let name = match parts[0].rsplit_once('.') {
            Some((package, _service)) if !package.is_empty() => package,
            _ => return Err(ResolveError::UnknownName(req.uri.path().to_owned())),
        };
        Ok(Endpoint::from_parts(name, req))
    }
}
