use std::sync::Arc;

use crate::error::Result;
use crate::protocol::*;
use crate::service::LicenseService;

/// How a client reaches the license server.
///
/// `Err` means the call never produced a response (connection refused,
/// timeout, garbage on the wire). Logical failures come back as `Ok` with a
/// non-OK status in the body.
pub trait LicenseTransport: Send + Sync {
    fn authenticate(&self, req: &AuthenticateRequest) -> Result<AuthenticateResponse>;
    fn create_license(&self, req: &CreateLicenseRequest) -> Result<CreateLicenseResponse>;
    fn delete_license(&self, req: &DeleteLicenseRequest) -> Result<DeleteLicenseResponse>;
    fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse>;
    fn query_license(&self, req: &QueryLicenseRequest) -> Result<QueryLicenseResponse>;
}

/// Calls a `LicenseService` in the same process, no sockets involved.
#[derive(Clone)]
pub struct LocalTransport {
    service: Arc<LicenseService>,
}

impl LocalTransport {
    pub fn new(service: Arc<LicenseService>) -> Self {
        Self { service }
    }
}

impl LicenseTransport for LocalTransport {
    fn authenticate(&self, req: &AuthenticateRequest) -> Result<AuthenticateResponse> {
        Ok(self.service.authenticate(req))
    }

    fn create_license(&self, req: &CreateLicenseRequest) -> Result<CreateLicenseResponse> {
        Ok(self.service.create_license(req))
    }

    fn delete_license(&self, req: &DeleteLicenseRequest) -> Result<DeleteLicenseResponse> {
        Ok(self.service.delete_license(req))
    }

    fn heartbeat(&self, req: &HeartbeatRequest) -> Result<HeartbeatResponse> {
        Ok(self.service.heartbeat(req))
    }

    fn query_license(&self, req: &QueryLicenseRequest) -> Result<QueryLicenseResponse> {
        Ok(self.service.query_license(req))
    }
}
