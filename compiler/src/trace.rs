use crate::types::TraceFlags;

/// Buffered stdout of a run: the echoed template and the trace channels
/// selected with `-f`, in the order they were produced.
#[derive(Debug)]
pub struct Console {
    flags: TraceFlags,
    buf:   String,
}

impl Console {
    pub fn new(flags: TraceFlags) -> Self {
        Console { flags, buf: String::new() }
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn enabled(&self, channel: TraceFlags) -> bool {
        self.flags.contains(channel)
    }

    /// Reproduce-original mode: echo the plain plist without annotations.
    pub fn is_original(&self) -> bool {
        self.enabled(TraceFlags::ORIGINAL)
    }

    /// Context lines go into the generated files only when both context and
    /// debug tracing are on.
    pub fn annotate_output(&self) -> bool {
        self.enabled(TraceFlags::CONTEXT | TraceFlags::DEBUG)
    }

    pub(crate) fn write(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub(crate) fn indent(&mut self, tab: usize) {
        self.buf.extend(std::iter::repeat('\t').take(tab));
    }

    fn channel_line(&mut self, channel: TraceFlags, tab: usize, text: &str) {
        if self.enabled(channel) {
            self.indent(tab);
            self.buf.push_str(text);
            self.buf.push('\n');
        }
    }

    pub fn key(&mut self, tab: usize, text: &str) {
        self.channel_line(TraceFlags::KEYS, tab, text);
    }

    pub fn oc_type(&mut self, tab: usize, text: &str) {
        self.channel_line(TraceFlags::OC_TYPES, tab, text);
    }

    pub fn context(&mut self, text: &str) {
        self.channel_line(TraceFlags::CONTEXT, 0, text);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Builds the ` name=value` lists used by the key and type traces.
#[derive(Debug, Default)]
pub struct TraceAttrs {
    text: String,
}

impl TraceAttrs {
    pub fn new(head: &str) -> Self {
        TraceAttrs { text: format!("[{}", head) }
    }

    pub fn quoted(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.text.push_str(&format!(" {}=\"{}\"", name, value));
        }
        self
    }

    pub fn plain<T: std::fmt::Display>(mut self, name: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.text.push_str(&format!(" {}={}", name, value));
        }
        self
    }

    pub fn finish(mut self) -> String {
        self.text.push(']');
        self.text
    }
}
