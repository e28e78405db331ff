use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::prelude::*;
use thiserror::Error;
use vm::op::{Address, Op};

/// One line of assembly: an instruction or a raw data word
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    Op(Op),
    Word(u64),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{span:?}: {message}")]
pub struct ParseError {
    pub span: Range<usize>,
    pub message: String,
}

fn parser<'a>() -> impl Parser<'a, &'a str, Vec<Stmt>, extra::Err<Rich<'a, char>>> {
    // Leading zeroes are fine: `0x0f`, `007`
    let hex = just("0x")
        .ignore_then(text::digits(16).to_slice())
        .try_map(|s: &str, span| u64::from_str_radix(s, 16).map_err(|e| Rich::custom(span, e)));
    let dec = text::digits(10)
        .to_slice()
        .try_map(|s: &str, span| s.parse::<u64>().map_err(|e| Rich::custom(span, e)));
    let num = choice((hex, dec)).padded();

    let reg = just('r')
        .ignore_then(text::int(10))
        .try_map(|s: &str, span| s.parse::<usize>().map_err(|e| Rich::custom(span, e)))
        .padded();

    let addr = choice((
        reg.clone()
            .delimited_by(just('['), just(']'))
            .map(Address::Register),
        just('@').ignore_then(num.clone()).map(Address::Direct),
    ))
    .padded();

    let nop = just("nop").to(Op::Nop);
    let mov = just("mov")
        .ignore_then(reg.clone())
        .then(reg.clone())
        .map(|(dst, src)| Op::Mov { dst, src });
    let add = just("add")
        .ignore_then(reg.clone())
        .then(reg.clone())
        .then(reg.clone())
        .map(|((dst, lhs), rhs)| Op::Add { dst, lhs, rhs });
    let load = just("load")
        .ignore_then(reg.clone())
        .then(addr.clone())
        .map(|(dst, addr)| Op::Load { dst, addr });
    let store = just("store")
        .ignore_then(reg.clone())
        .then(addr)
        .map(|(src, addr)| Op::Store { src, addr });
    let pixel = just("pixel")
        .ignore_then(num.clone())
        .then(num.clone())
        .then(num.clone())
        .then(num.clone())
        .then(num.clone())
        .then(num.clone())
        .map(|(((((x, y), r), g), b), a)| Op::SetPixel {
            x,
            y,
            rgba: [r, g, b, a],
        });
    let jmp = just("jmp").ignore_then(num.clone()).map(Op::Jump);
    let beq = just("beq")
        .ignore_then(reg.clone())
        .then(reg)
        .then(num.clone())
        .map(|((a, b), offset)| Op::BranchEq { a, b, offset });

    let op = choice((nop, mov, add, load, store, pixel, jmp, beq)).map(Stmt::Op);
    let word = just("word").ignore_then(num).map(Stmt::Word);

    choice((op, word)).padded().repeated().collect()
}

/// Blank out `;` comments without moving any byte offsets
fn strip_comments(s: &str) -> String {
    s.split_inclusive('\n')
        .map(|line| match line.find(';') {
            Some(i) => {
                let newline = if line.ends_with('\n') { "\n" } else { "" };
                let blank = line.len() - i - newline.len();
                format!("{}{}{}", &line[..i], " ".repeat(blank), newline)
            }
            None => line.to_string(),
        })
        .collect()
}

pub fn parse(s: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
    let src = strip_comments(s);
    let (stmts, errs) = parser().parse(src.trim_end()).into_output_errors();
    errs.iter().for_each(|e| {
        let _ = Report::build(ReportKind::Error, e.span().into_range())
            .with_message(e.to_string())
            .with_label(
                Label::new(e.span().into_range())
                    .with_message(e.reason().to_string())
                    .with_color(Color::Red),
            )
            .finish()
            .eprint(Source::from(&src));
    });
    if !errs.is_empty() {
        return Err(errs
            .into_iter()
            .map(|e| ParseError {
                span: e.span().into_range(),
                message: e.to_string(),
            })
            .collect());
    }
    stmts.ok_or_else(Vec::new)
}
