//! Home of the [`ByteSink`] trait: the text-output capability consumed by
//! [`crate::fat::file::read_file_to_sink`].
//!
//! Actually putting a byte on a wire (UART, framebuffer, whatever) is an
//! external collaborator; this crate only expands `\n` to `\r\n` and drops
//! `\0` on the way to whatever `put_byte` does.

pub trait ByteSink {
    fn put_byte(&mut self, b: u8);

    fn put_str(&mut self, s: &str) {
        for b in s.bytes() {
            self.put_byte(b);
        }
    }
}

using_std! {
    /// An in-memory [`ByteSink`] for tests.
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    pub struct StringSink(pub String);

    impl ByteSink for StringSink {
        fn put_byte(&mut self, b: u8) {
            self.0.push(b as char);
        }
    }
}
