//! PRE/RUN/POST section buffering.
//!
//! Output is written through a stack of scopes. Each scope collects lines
//! and, when closed, splices them into its target section, either appended
//! or prepended. Prepending lets header material computed after the run
//! traversal (the tool table) land ahead of lines already in place.
//! Concatenation order at finalize is always PRE, RUN, POST.

/// Output section names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Header and job setup, emitted before any operation output.
    Pre,
    /// Operation output in command arrival order.
    Run,
    /// Shutdown commands.
    Post,
}

/// Where a finished scope's lines land in its target section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// After any lines already in the section.
    #[default]
    Append,
    /// Before any lines already in the section.
    Prepend,
}

#[derive(Debug)]
struct Scope {
    section: Section,
    placement: Placement,
    lines: Vec<String>,
}

/// Three ordered line streams with scoped composition.
#[derive(Debug, Default)]
pub struct SectionBuffer {
    pre: Vec<String>,
    run: Vec<String>,
    post: Vec<String>,
    scopes: Vec<Scope>,
}

impl SectionBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope: lines written until [`end`](Self::end) collect into it.
    pub fn begin(&mut self, section: Section, placement: Placement) {
        self.scopes.push(Scope {
            section,
            placement,
            lines: Vec::new(),
        });
    }

    /// Close the innermost scope, splicing its lines into the target.
    pub fn end(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        let target = self.section_mut(scope.section);
        match scope.placement {
            Placement::Append => target.extend(scope.lines),
            Placement::Prepend => {
                target.splice(0..0, scope.lines);
            }
        }
    }

    /// Run `f` inside a scope, restoring the previous scope on every exit
    /// path.
    pub fn scoped<R>(
        &mut self,
        section: Section,
        placement: Placement,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.begin(section, placement);
        let out = f(self);
        self.end();
        out
    }

    /// Append one rendered command line.
    pub fn command(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.sink().push(line);
    }

    /// Append a parenthesized comment line.
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.command(format!("({})", text.as_ref()));
    }

    /// Append a blank separator line.
    pub fn blank(&mut self) {
        self.sink().push(String::new());
    }

    /// Concatenate PRE, RUN, POST, newline-joined. Consumes the buffer;
    /// this is the only read path.
    pub fn finalize(mut self) -> String {
        // Close anything still open so no scope's lines are lost.
        while !self.scopes.is_empty() {
            self.end();
        }
        let mut lines = self.pre;
        lines.append(&mut self.run);
        lines.append(&mut self.post);
        lines.join("\n")
    }

    fn sink(&mut self) -> &mut Vec<String> {
        match self.scopes.last_mut() {
            Some(scope) => &mut scope.lines,
            // Writes outside any scope land in the run section.
            None => &mut self.run,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut Vec<String> {
        match section {
            Section::Pre => &mut self.pre,
            Section::Run => &mut self.run,
            Section::Post => &mut self.post,
        }
    }
}
