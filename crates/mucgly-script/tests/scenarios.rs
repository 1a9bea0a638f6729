//! End-to-end tests: the parser driven by the bundled interpreter over an
//! in-memory file system.

use mucgly::error::Severity;
use mucgly::parse::{ParseState, Parser};
use mucgly_common::InMemoryFileSystem;
use mucgly_script::Interpreter;
use std::path::Path;
use std::rc::Rc;

fn process_files(files: &[(&str, &str)]) -> (mucgly::Result<()>, Rc<InMemoryFileSystem>) {
    let mut fs = InMemoryFileSystem::new();
    for (name, contents) in files {
        fs.add_file(*name, *contents);
    }
    let fs = Rc::new(fs);
    let ps = ParseState::new(Box::new(Rc::clone(&fs)), Some(Path::new("out"))).unwrap();
    let interp = Interpreter::with_file_system(Box::new(Rc::clone(&fs)));
    let mut parser = Parser::new(ps, interp);
    let result = parser.process_file(Some(Path::new(files[0].0)), None);
    drop(parser);
    (result, fs)
}

fn process(input: &str) -> String {
    let (result, fs) = process_files(&[("in.mg", input)]);
    result.unwrap();
    fs.output("out").unwrap().to_string_lossy()
}

fn process_err(input: &str) -> Box<mucgly::Error> {
    let (result, _) = process_files(&[("in.mg", input)]);
    result.unwrap_err()
}

macro_rules! scenario_tests {
    ( $( ($name: ident, $input: expr, $want: expr), )+ ) => {
        $(
        #[test]
        fn $name() {
            assert_eq!(process($input), $want);
        }
        )+
    };
}

scenario_tests![
    (expression_in_running_text, "Hello -<.1+2>- world\n", "Hello 3 world\n"),
    (escapes_pass_delimiters, "A\\-<B\\>-C", "A-<B>-C"),
    (block_hides_output, "-<:block>-HIDDEN-<:unblock>-SHOWN", "SHOWN"),
    (plus_prefix_eats_following_byte, "-<+. \"x\">- Y", "xY"),
    (deferred_evaluation_strips_one_hash, "-<#still>-", "-<still>-"),
    (hookbeg_directive_changes_only_beg, "-<:hookbeg {{>-\nBefore {{.42>- After\n", "\nBefore 42 After\n"),
    (string_result_written_verbatim, "-<.\"a<b\">-", "a<b"),
    (non_string_result_inspected, "-<.[1, \"a\", nil]>-", "[1, \"a\", nil]"),
    (statement_discards_result, "A-<1+2>-B", "AB"),
    (write_and_puts, "-<write(\"a\"); puts(\"b\")>-c", "ab\nc"),
    (variables_persist_across_macros, "-<x = 2>--<.x*21>-", "42"),
    (sethook_from_script, "-<sethook(\"[\", \"]\")>-[.1+1]", "2"),
    (position_queries, "-<.ifilename()>-\n-<.ilinenumber()>-", "in.mg\n2"),
    (output_queries, "-<.ofilename()>--<.olinenumber()>-", "out1"),
    (defer_uses_current_hooks, "-<:hook ( )>-(#keep)", "(keep)"),
];

#[test]
fn post_config_delimiters_are_observable() {
    // after `:hookbeg {{` the begin hook changed and the end hook did not
    assert_eq!(
        process("-<:hookbeg {{>-{{.hookbeg() + \" \" + hookend() + \" \" + hookesc()>-"),
        "{{ >- \\"
    );
}

#[test]
fn eater_from_script() {
    assert_eq!(process("-<seteater(\"%%\")>-a\\%%bc"), "ac");
    assert_eq!(process("-<seteater(\"%%\")>--<seteater(nil)>-\\%%b"), "%%b");
}

#[test]
fn multihook_flat_pairs() {
    assert_eq!(
        process("-<multihook(\"(\", \")\", \"[\", \"]\")>-(.1)[.2]"),
        "12"
    );
}

#[test]
fn multihook_single_list() {
    assert_eq!(process("-<multihook([\"(\", \")\"])>-(.7)"), "7");
}

#[test]
fn multihook_triplet_suspension() {
    // the suspension turns the next end hook into literal body bytes
    assert_eq!(
        process("-<multihook([\"{\", \"}\", \"|\"])>-{. \"a|}b\" }"),
        "a|}b"
    );
}

#[test]
fn nested_output_sinks_are_isolated() {
    let (result, fs) =
        process_files(&[("in.mg", "A-<pushoutput(\"side\")>-B-<closeoutput()>-C")]);
    result.unwrap();
    assert_eq!(fs.output("out").unwrap().to_string_lossy(), "AC");
    assert_eq!(fs.output("side").unwrap().to_string_lossy(), "B");
}

#[test]
fn two_push_inputs_in_one_macro_are_read_in_order() {
    let (result, fs) = process_files(&[
        ("in.mg", "-<pushinput(\"a.mg\"); pushinput(\"b.mg\")>-X"),
        ("a.mg", "1"),
        ("b.mg", "2"),
    ]);
    result.unwrap();
    assert_eq!(fs.output("out").unwrap().to_string_lossy(), "12X");
}

#[test]
fn close_input_stops_reading_the_current_source() {
    assert_eq!(process("1-<closeinput()>-2"), "1");
}

#[test]
fn source_directive_loads_a_script_file() {
    let (result, fs) = process_files(&[
        ("in.mg", "-<:source lib.mg>--<.greeting>-"),
        ("lib.mg", "greeting = \"hi\"\n"),
    ]);
    result.unwrap();
    assert_eq!(fs.output("out").unwrap().to_string_lossy(), "hi");
}

#[test]
fn missing_source_file_is_skipped() {
    assert_eq!(process("-<:source nowhere.mg>-ok"), "ok");
}

#[test]
fn script_exception_is_an_error_diagnostic() {
    let err = process_err("-<.1/0>-");
    assert_eq!(err.severity(), Severity::Error);
    assert_eq!(err.to_string(), "mucgly error in \"in.mg:1:3\": divided by 0");
}

#[test]
fn undefined_variable_reports_macro_position() {
    let err = process_err("line one\n  -<.oops>-");
    assert_eq!(
        err.to_string(),
        "mucgly error in \"in.mg:2:5\": undefined variable `oops`"
    );
}

#[test]
fn partially_executed_script_still_wrote_output() {
    let (result, fs) = process_files(&[("in.mg", "-<write(\"x\"); 1/0>-")]);
    result.unwrap_err();
    assert_eq!(fs.output("out").unwrap().to_string_lossy(), "x");
}

#[test]
fn identical_runs_are_deterministic() {
    let input = "-<x = 3>-a-<.x>-b\\ c-<#d>--<multihook(\"(\", \")\")>-(.x)";
    assert_eq!(process(input), process(input));
}
