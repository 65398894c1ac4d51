/// Settings shared by every request sent through this crate.
#[derive(Clone, Debug)]
pub struct FastcgiClientConfig {
    /// Reported to the backend as both SERVER_SOFTWARE and SERVER_NAME.
    pub server_software: String,
    /// Ask the backend to keep the connection open after each request.
    pub keep_connection: bool,
    /// Initial capacity of each request's record buffer.
    pub buffer_capacity: usize,
}

impl Default for FastcgiClientConfig {
    fn default() -> FastcgiClientConfig {
        FastcgiClientConfig {
            server_software: concat!("tokio-fastcgi-client/", env!("CARGO_PKG_VERSION")).to_owned(),
            keep_connection: true,
            buffer_capacity: 4096,
        }
    }
}

impl FastcgiClientConfig {
    pub fn new() -> FastcgiClientConfig {
        FastcgiClientConfig::default()
    }

    pub fn server_software<S: Into<String>>(mut self, name: S) -> FastcgiClientConfig {
        self.server_software = name.into();
        self
    }

    pub fn keep_connection(mut self, keep: bool) -> FastcgiClientConfig {
        self.keep_connection = keep;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> FastcgiClientConfig {
        self.buffer_capacity = capacity;
        self
    }
}
