//! Static inputs shared by the integration suites

/// Smallest byte string `image::guess_format` recognises as PNG.
pub const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// JWT secret used by every test server.
pub const TEST_SECRET: &str = "test-secret";

/// A template the tests create on demand.
#[derive(Debug, Clone, Copy)]
pub struct TemplateFixture {
    pub name: &'static str,
    pub credit_cost: i64,
}

pub const PORTRAIT: TemplateFixture = TemplateFixture {
    name: "Studio Portrait",
    credit_cost: 20,
};

pub const FREE_SKETCH: TemplateFixture = TemplateFixture {
    name: "Pencil Sketch",
    credit_cost: 0,
};

/// PNG-looking payload tagged with `n` so individual jobs can be told apart.
pub fn tagged_image(n: u32) -> Vec<u8> {
    let mut bytes = PNG_HEADER.to_vec();
    bytes.extend_from_slice(&n.to_be_bytes());
    bytes
}
