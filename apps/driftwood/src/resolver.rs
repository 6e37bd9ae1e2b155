use url::Url;

const DEFAULT_SSL_PORT: u16 = 443;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Https,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Wss => "wss",
        }
    }
}

/// Maps logical backend paths to physical addresses on the loopback
/// interface. The default SSL port is elided from the rendered URL.
#[derive(Clone, Copy, Debug)]
pub struct LinkResolver {
    port: u16,
}

impl LinkResolver {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn resolve(&self, path: &str, scheme: Scheme) -> Result<Url, url::ParseError> {
        let base = if self.port == DEFAULT_SSL_PORT {
            format!("{}://127.0.0.1", scheme.as_str())
        } else {
            format!("{}://127.0.0.1:{}", scheme.as_str(), self.port)
        };
        Url::parse(&format!("{base}{path}"))
    }
}
