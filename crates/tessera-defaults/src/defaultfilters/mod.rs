// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The `defaultfilters` library.
//!
//! Filters registered with `safe_filter_fn` keep a safe input safe; the
//! others hand their output back unmarked and let the expression decide.

mod lists;
mod logic;
mod strings;

use tessera_engine::{Error, Library, Value};

pub(crate) type FilterResult = Result<Value, Error>;

pub fn library() -> Library {
    Library::builder()
        // strings
        .safe_filter_fn("addslashes", strings::addslashes)
        .safe_filter_fn("capfirst", strings::capfirst)
        .safe_filter_fn("center", strings::center)
        .safe_filter_fn("escape", strings::escape)
        .filter_fn("escapejs", strings::escapejs)
        .safe_filter_fn("fix_ampersands", strings::fix_ampersands)
        .safe_filter_fn("floatformat", strings::floatformat)
        .safe_filter_fn("force_escape", strings::force_escape)
        .filter_fn("cut", strings::cut)
        .safe_filter_fn("linebreaks", strings::linebreaks)
        .safe_filter_fn("linebreaksbr", strings::linebreaksbr)
        .safe_filter_fn("linenumbers", strings::linenumbers)
        .safe_filter_fn("ljust", strings::ljust)
        .safe_filter_fn("lower", strings::lower)
        .filter_fn("removetags", strings::removetags)
        .safe_filter_fn("rjust", strings::rjust)
        .safe_filter_fn("safe", strings::safe)
        .safe_filter_fn("safeseq", strings::safeseq)
        .safe_filter_fn("slugify", strings::slugify)
        .filter_fn("striptags", strings::striptags)
        .safe_filter_fn("title", strings::title)
        .filter_fn("truncatechars", strings::truncatechars)
        .safe_filter_fn("truncatewords", strings::truncatewords)
        .filter_fn("upper", strings::upper)
        .safe_filter_fn("wordcount", strings::wordcount)
        .safe_filter_fn("wordwrap", strings::wordwrap)
        // lists
        .safe_filter_fn("dictsort", lists::dictsort)
        .filter_fn("first", lists::first)
        .safe_filter_fn("join", lists::join)
        .filter_fn("last", lists::last)
        .safe_filter_fn("length", lists::length)
        .safe_filter_fn("length_is", lists::length_is)
        .safe_filter_fn("make_list", lists::make_list)
        .safe_filter_fn("slice", lists::slice)
        .safe_filter_fn("unordered_list", lists::unordered_list)
        // logic and numbers
        .filter_fn("add", logic::add)
        .filter_fn("default", logic::default)
        .filter_fn("default_if_none", logic::default_if_none)
        .filter_fn("divisibleby", logic::divisibleby)
        .filter_fn("get_digit", logic::get_digit)
        .filter_fn("yesno", logic::yesno)
        .build()
}
