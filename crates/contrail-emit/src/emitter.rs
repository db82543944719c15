use crate::config::EmitterConfig;
use anyhow::Result;
use std::io::Write;

pub type EmitResult = Result<()>;

#[derive(Debug, Clone)]
pub struct EmitContext {
    pub indent_level: usize,
    pub indent_chars: String,
    pub use_colors: bool,
}

impl EmitContext {
    pub fn new() -> Self {
        Self {
            indent_level: 0,
            indent_chars: "    ".to_string(),
            use_colors: false,
        }
    }

    pub fn from_config(config: &EmitterConfig) -> Self {
        Self {
            indent_level: 0,
            indent_chars: " ".repeat(config.indent_width),
            use_colors: config.use_colors,
        }
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        if self.indent_level > 0 {
            self.indent_level -= 1;
        }
    }

    pub fn get_indent(&self) -> String {
        self.indent_chars.repeat(self.indent_level)
    }
}

impl Default for EmitContext {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emitter {
    type Item;

    fn emit<W: Write>(
        &self,
        item: &Self::Item,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult;

    fn emit_to_string(&self, item: &Self::Item) -> Result<String> {
        let mut buffer = Vec::new();
        let mut context = EmitContext::new();
        self.emit(item, &mut buffer, &mut context)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Text colors used by the emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Plain,
    Header,
    Label,
    Comment,
    Exit,
}

pub struct EmitHelper;

impl EmitHelper {
    pub fn write_line<W: Write>(writer: &mut W, context: &EmitContext, text: &str) -> EmitResult {
        writeln!(writer, "{}{}", context.get_indent(), text)?;
        Ok(())
    }

    pub fn write_colored_line<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        text: &str,
        tint: Tint,
    ) -> EmitResult {
        if context.use_colors {
            use colored::Colorize;
            let colored_text = match tint {
                Tint::Plain => text.to_string(),
                Tint::Header => text.bright_blue().bold().to_string(),
                Tint::Label => text.yellow().to_string(),
                Tint::Comment => text.green().to_string(),
                Tint::Exit => text.red().to_string(),
            };
            writeln!(writer, "{}{}", context.get_indent(), colored_text)?;
        } else {
            Self::write_line(writer, context, text)?;
        }
        Ok(())
    }

    pub fn write_comment<W: Write>(
        writer: &mut W,
        context: &EmitContext,
        comment: &str,
    ) -> EmitResult {
        Self::write_colored_line(writer, context, &format!("// {}", comment), Tint::Comment)
    }

    pub fn write_block<W: Write, F>(
        writer: &mut W,
        context: &mut EmitContext,
        header: &str,
        body: F,
    ) -> EmitResult
    where
        F: FnOnce(&mut W, &mut EmitContext) -> EmitResult,
    {
        Self::write_colored_line(writer, context, &format!("{} {{", header), Tint::Header)?;
        context.indent();
        body(writer, context)?;
        context.dedent();
        Self::write_line(writer, context, "}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_indentation() {
        let mut ctx = EmitContext::new();
        assert_eq!(ctx.get_indent(), "");

        ctx.indent();
        ctx.indent();
        assert_eq!(ctx.get_indent(), "        ");

        ctx.dedent();
        ctx.dedent();
        ctx.dedent();
        assert_eq!(ctx.indent_level, 0);
    }

    #[test]
    fn test_context_from_config() {
        let config = EmitterConfig {
            indent_width: 2,
            ..EmitterConfig::default()
        };
        let mut ctx = EmitContext::from_config(&config);
        ctx.indent();
        assert_eq!(ctx.get_indent(), "  ");
        assert!(!ctx.use_colors);
    }

    #[test]
    fn test_write_block_nests_body() {
        let mut buffer = Vec::new();
        let mut ctx = EmitContext::new();
        EmitHelper::write_block(&mut buffer, &mut ctx, "outer", |w, ctx| {
            EmitHelper::write_comment(w, ctx, "inside")
        })
        .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "outer {\n    // inside\n}\n");
    }
}
