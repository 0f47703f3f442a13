mod api;

pub use api::{
    IpResponse, PingResponse, STATUS_OK, ServiceKeyResponse, WanUpdateRequest, WanUpdateResponse,
};
