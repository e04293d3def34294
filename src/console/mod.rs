//! Line-oriented command console over a pool-backed command table
//!
//! Commands are looked up by their first word in a [`PoolMap`] with 31
//! buckets hashed by BKDR. Handlers write their output through
//! [`core::fmt::Write`] and report status as an [`Error`].

use core::fmt::{self, Write};

use crate::allocator::Heap;
use crate::collections::{bkdr_hash, PoolMap};
use crate::errors::{Error, Result};
use crate::logging;

/// Buckets in the command table
pub const COMMAND_BUCKETS: usize = 31;

/// Command handler: receives the arguments after the command name
pub type CommandFn = fn(&mut CommandContext<'_>, &[&str]) -> Result<()>;

/// One registered command
#[derive(Clone, Copy)]
pub struct CommandDesc {
    pub name: &'static str,
    pub description: &'static str,
    /// `None` marks a command whose platform support is missing
    pub handler: Option<CommandFn>,
}

impl CommandDesc {
    pub const fn new(name: &'static str, description: &'static str, handler: CommandFn) -> Self {
        Self {
            name,
            description,
            handler: Some(handler),
        }
    }

    /// Listed in `help`, but reports `Unsupported` when run
    pub const fn stub(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            handler: None,
        }
    }
}

impl fmt::Debug for CommandDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDesc")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("implemented", &self.handler.is_some())
            .finish()
    }
}

/// What a running handler can reach
pub struct CommandContext<'a> {
    pub table: &'a CommandTable,
    pub heap: &'a Heap,
    pub out: &'a mut dyn Write,
}

/// Commands available out of the box
pub const BUILTIN_COMMANDS: [CommandDesc; 2] = [
    CommandDesc::new("help", "List every command", help),
    CommandDesc::new("pools", "Show pool usage", pools),
];

pub struct CommandTable {
    commands: PoolMap<CommandDesc>,
}

impl CommandTable {
    /// Empty table whose buckets live in the heap's default pool
    pub fn new(heap: &Heap) -> Result<Self> {
        Ok(Self {
            commands: PoolMap::with_default_pool(heap, COMMAND_BUCKETS, bkdr_hash)?,
        })
    }

    /// Table with [`BUILTIN_COMMANDS`] registered
    pub fn with_builtins(heap: &Heap) -> Result<Self> {
        let mut table = Self::new(heap)?;
        for desc in BUILTIN_COMMANDS {
            table.register(desc)?;
        }
        Ok(table)
    }

    /// Add a command; registering a taken name replaces the old command
    pub fn register(&mut self, desc: CommandDesc) -> Result<()> {
        self.commands.insert(desc.name, desc)
    }

    pub fn unregister(&mut self, name: &str) -> Result<()> {
        self.commands.remove(name)
    }

    pub fn lookup(&self, name: &str) -> Result<&CommandDesc> {
        self.commands.search(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered commands in table order
    pub fn iter(&self) -> impl Iterator<Item = &CommandDesc> {
        self.commands.iter().map(|(_, desc)| desc)
    }

    /// Split `line` on whitespace and run the command named by its first word
    ///
    /// A blank line does nothing. An unknown name is `UnknownCommand`, kept
    /// apart from any `NotFound` a handler reports itself.
    pub fn execute(&self, line: &str, heap: &Heap, out: &mut dyn Write) -> Result<()> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(());
        };
        let args: Vec<&str> = words.collect();

        let desc = *self
            .commands
            .search(name)
            .map_err(|_| Error::unknown_command(name))?;
        let handler = desc
            .handler
            .ok_or_else(|| Error::unsupported(desc.name))?;

        logging::log_command(desc.name, args.len());

        let mut ctx = CommandContext {
            table: self,
            heap,
            out,
        };
        handler(&mut ctx, &args)
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|desc| desc.name)).finish()
    }
}

fn help(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<()> {
    let mut listing = String::new();
    ctx.table.commands.for_each(|name, desc| {
        listing.push_str(name);
        listing.push_str(" - ");
        listing.push_str(desc.description);
        listing.push_str("\r\n\r\n");
    });
    ctx.out.write_str(&listing)?;
    Ok(())
}

fn pools(ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<()> {
    for stats in ctx.heap.stats() {
        write!(
            ctx.out,
            "{} {}: {}/{} bytes free, {} used, {} free blocks, largest {}\r\n",
            stats.id,
            stats.name,
            stats.available,
            stats.capacity,
            stats.used_blocks,
            stats.free_blocks,
            stats.largest_free
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocatorConfig;

    fn heap() -> Heap {
        Heap::from_config(&AllocatorConfig::default()).expect("heap")
    }

    fn echo(ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<()> {
        write!(ctx.out, "{}", args.join(","))?;
        Ok(())
    }

    #[test]
    fn test_register_and_lookup() {
        let heap = heap();
        let mut table = CommandTable::with_builtins(&heap).unwrap();
        assert_eq!(table.len(), 2);

        table.register(CommandDesc::new("echo", "Echo args", echo)).unwrap();
        assert_eq!(table.lookup("echo").unwrap().description, "Echo args");

        // Last registration wins
        table.register(CommandDesc::stub("echo", "Other")).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("echo").unwrap().description, "Other");
        assert!(table.lookup("echo").unwrap().handler.is_none());

        table.register(CommandDesc::stub("help", "replacement")).unwrap();
        assert_eq!(table.lookup("help").unwrap().description, "replacement");

        table.unregister("echo").unwrap();
        assert!(matches!(table.lookup("echo"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_execute_passes_arguments() {
        let heap = heap();
        let mut table = CommandTable::new(&heap).unwrap();
        table.register(CommandDesc::new("echo", "Echo args", echo)).unwrap();

        let mut out = String::new();
        table.execute("  echo a  b c ", &heap, &mut out).unwrap();
        assert_eq!(out, "a,b,c");
    }

    #[test]
    fn test_execute_errors() {
        let heap = heap();
        let mut table = CommandTable::new(&heap).unwrap();
        table.register(CommandDesc::stub("reboot", "Restart")).unwrap();

        let mut out = String::new();
        assert!(table.execute("   ", &heap, &mut out).is_ok());

        let missing = table.execute("flash 0x0", &heap, &mut out);
        assert!(matches!(missing, Err(Error::UnknownCommand { ref name }) if name == "flash"));
        assert_eq!(missing.unwrap_err().errno(), crate::errors::errno::ENODEV);

        let stub = table.execute("reboot", &heap, &mut out);
        assert!(matches!(stub, Err(Error::Unsupported { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_pools_lists_every_pool() {
        let heap = heap();
        let table = CommandTable::with_builtins(&heap).unwrap();

        let mut out = String::new();
        table.execute("pools", &heap, &mut out).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("#0 default"));
        assert!(out.contains("#1 testcase"));
    }

    #[test]
    fn test_drop_returns_table_memory() {
        let heap = heap();
        let table = CommandTable::with_builtins(&heap).unwrap();
        assert!(!heap.is_clean(heap.default_pool()));
        drop(table);
        assert!(heap.is_clean_all());
    }
}
