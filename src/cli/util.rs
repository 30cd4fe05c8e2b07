use failure::Fail;
use std::{fmt, io::{self, BufRead, Write}};
use termion::style::{Reset, Underline};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::{
    Config,
    Result,
    db::Connection,
    mail::Mailer,
    moderation::Context,
    models::User,
};

/// Find the user on whose behalf a command acts.
pub fn acting_user(db: &Connection, email: Option<&str>) -> Result<Option<User>> {
    match email {
        Some(email) => Ok(Some(User::by_email(db, email)?)),
        None => Ok(None),
    }
}

/// Run `f` in a moderation context of the acting user.
pub fn with_context<F, T>(cfg: &Config, user: Option<&User>, f: F) -> Result<T>
where
    F: FnOnce(&Context) -> Result<T>,
{
    let mailer = Mailer::from_config(&cfg.mail);
    let ctx = Context {
        config: cfg,
        user,
        mailer: &mailer,
    };
    f(&ctx)
}

/// Ask the user a yes/no question. Only answers starting with `y` are
/// affirmative.
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;

    Ok(is_affirmative(&answer))
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim_start().starts_with(|c| c == 'y' || c == 'Y')
}

#[derive(Debug, Fail)]
#[fail(display = "Operation cancelled")]
pub struct Cancelled;

pub fn print_table<H, T, R>(header: H, rows: T)
where
    H: TableRow,
    T: AsRef<[R]>,
    R: TableRow<Size = H::Size>,
{
    let mut widths = vec![0; H::size()];

    for (inx, width) in widths.iter_mut().enumerate() {
        *width = UnicodeWidthStr::width(header.column(inx));
    }

    for row in rows.as_ref() {
        for (inx, width) in widths.iter_mut().enumerate() {
            *width = (*width).max(UnicodeWidthStr::width(row.column(inx)));
        }
    }

    // Sum of all longest widths and spaces separating them.
    let total_width = widths.iter().sum::<usize>() + widths.len() - 1;

    let (terminal_width, _) = termion::terminal_size().unwrap_or((80, 20));
    let terminal_width = usize::from(terminal_width);

    // Only the last column is truncated. If that's not enough, let the
    // terminal wrap lines.
    if total_width >= terminal_width {
        let overflow = total_width - terminal_width;
        if let Some(last) = widths.last_mut() {
            if overflow < *last {
                *last -= overflow;
            }
        }
    }

    for (inx, width) in widths.iter().enumerate() {
        if inx > 0 {
            print!(" ");
        }
        print!("{}{}{}", Underline, Column(header.column(inx), *width), Reset);
    }
    println!();

    for row in rows.as_ref() {
        for (inx, width) in widths.iter().enumerate() {
            if inx > 0 {
                print!(" ");
            }
            print!("{}", Column(row.column(inx), *width));
        }
        println!();
    }
}

pub trait TableRow {
    type Size;

    fn size() -> usize;

    fn column(&self, index: usize) -> &str;
}

macro_rules! impl_table_row {
    {
        $(
            $sizeconst:literal $size:ident => $($inx:tt : $ty:ident),+
        );+
        $(;)*
    } => {
        $(
            pub struct $size;

            impl<$($ty),+> TableRow for ($($ty,)+)
            where
                $($ty: AsRef<str>),+
            {
                type Size = $size;

                fn size() -> usize { $sizeconst }

                fn column(&self, index: usize) -> &str {
                    match index {
                        $($inx => self.$inx.as_ref(),)+
                        _ => "",
                    }
                }
            }
        )+
    };
}

impl_table_row! {
    2 Two   => 0: A, 1: B;
    3 Three => 0: A, 1: B, 2: C;
    4 Four  => 0: A, 1: B, 2: C, 3: D;
    5 Five  => 0: A, 1: B, 2: C, 3: D, 4: E;
    6 Six   => 0: A, 1: B, 2: C, 3: D, 4: E, 5: F;
}

/// A single table cell, truncated or padded to a fixed width.
struct Column<'a>(&'a str, usize);

impl<'a> fmt::Display for Column<'a> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let (len, end) = self.0.char_indices()
            .scan(0, |total_len, (inx, chr)| {
                *total_len += UnicodeWidthChar::width(chr).unwrap_or(0);
                if *total_len > self.1 {
                    None
                } else {
                    Some((*total_len, inx + chr.len_utf8()))
                }
            })
            .last()
            .unwrap_or((0, 0));

        let pad = self.1.saturating_sub(len);

        write!(fmt, "{0}{1:2$}", &self.0[..end], "", pad)
    }
}
