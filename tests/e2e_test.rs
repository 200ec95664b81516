// Test complete flow of the application
// Run with `cargo test --test e2e_test`

use std::fs;

use regex::Regex;
use structscan::{
    BulkPattern, BulkSearch, BulkSearchBuilder, CancellationToken, Occurrences, SyntaxTree,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Label and source text of every position, in the iteration order of the occurrences.
fn flatten(tree: &SyntaxTree, occurrences: &Occurrences) -> Vec<(String, String)> {
    occurrences
        .iter()
        .flat_map(|(label, positions)| {
            positions
                .iter()
                .map(move |id| (label.to_string(), tree.source_text(*id).to_string()))
        })
        .collect()
}

fn verified_matches(
    search: &BulkSearch,
    tree: &SyntaxTree,
    pattern: &BulkPattern,
    cancel: &CancellationToken,
) -> Occurrences {
    let candidates = search
        .match_tree(tree, tree.root(), pattern, cancel)
        .unwrap()
        .unwrap();
    search.verify(tree, &candidates, pattern, cancel).unwrap()
}

#[test]
fn e2e_test() {
    init();

    // Initialize the regex for newlines. It is used to make the tests platform independent.
    let rx_newline: Regex = Regex::new(r"\r?\n|\r").unwrap();
    let cancel = CancellationToken::new();
    let nfa = BulkSearch::new();
    let copy_finder = BulkSearchBuilder::new().use_copy_finder().build();

    // Iterate over all json files in the data directory that contain pattern sets
    for entry in fs::read_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data")).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.extension().unwrap() != "json" {
            continue;
        }

        println!("--------------------------------------------------");
        println!("Entry: {:?}", entry.file_name());
        println!("--------------------------------------------------");

        let file = fs::File::open(&path).unwrap();
        let patterns: Vec<String> = serde_json::from_reader(file)
            .unwrap_or_else(|e| panic!("**** Failed to read json file {}: {}", path.display(), e));

        // The input file has the same base name as the json file but an .input extension.
        let input = fs::read_to_string(path.with_extension("input")).unwrap();
        let input = rx_newline.replace_all(&input, "\n");
        let tree = SyntaxTree::parse_source(&input).unwrap();

        let pattern = nfa.create(&patterns, &cancel).unwrap().unwrap();
        let matches = flatten(&tree, &verified_matches(&nfa, &tree, &pattern, &cancel));
        for (label, text) in &matches {
            println!("{}: '{}'", label, text);
        }

        // The expected matches are in a file with the .matches extension.
        let expected_file = fs::File::open(path.with_extension("matches")).unwrap();
        let expected: Vec<(String, String)> = serde_json::from_reader(expected_file).unwrap();
        assert_eq!(matches, expected, "{}", path.display());

        // The exact matcher finds the same positions without verification.
        let pattern = copy_finder.create(&patterns, &cancel).unwrap().unwrap();
        let exact = copy_finder
            .match_tree(&tree, tree.root(), &pattern, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(flatten(&tree, &exact), expected, "{}", path.display());
    }
}

const METHOD: &str = r#"
class Account {
    int balance(int amount) {
        if (amount < 0) {
            return 0;
        }
        int result = amount * 2;
        close();
        close();
        close();
        return result;
    }
}
"#;

#[test]
fn return_statements_are_found() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let pattern = search.create(["return $val$;"], &cancel).unwrap().unwrap();
    let tree = SyntaxTree::parse_source(METHOD).unwrap();
    let occurrences = search
        .match_tree(&tree, tree.root(), &pattern, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(occurrences.len(), 1);
    let texts: Vec<&str> = occurrences
        .get("return $val$;")
        .unwrap()
        .iter()
        .map(|id| tree.source_text(*id))
        .collect();
    assert_eq!(texts, vec!["return 0;", "return result;"]);
}

#[test]
fn absent_pattern_does_not_match() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let pattern = search.create(["break $val;"], &cancel).unwrap().unwrap();
    let tree = SyntaxTree::parse_source(METHOD).unwrap();
    assert_eq!(
        search.matches(&tree, tree.root(), &pattern, &cancel).unwrap(),
        Some(false)
    );
    let pattern = search.create(["close()"], &cancel).unwrap().unwrap();
    assert_eq!(
        search.matches(&tree, tree.root(), &pattern, &cancel).unwrap(),
        Some(true)
    );
}

#[test]
fn invalid_pattern_set_is_rejected() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let result = search.create(["return $val$;", "return (;"], &cancel);
    assert!(result.is_err());
}

#[test]
fn frequencies_of_encoded_tree() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let tree = SyntaxTree::parse_source(METHOD).unwrap();
    let mut context = search.new_encoding_context();
    search.encode(&tree, &mut context, &cancel).unwrap().unwrap();
    let encoded = context.into_encoded();

    let pattern = search
        .create(["close()", "return $val$;", "open()"], &cancel)
        .unwrap()
        .unwrap();
    let frequencies = search
        .matches_with_frequencies(encoded.as_slice(), &pattern, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(frequencies.get("close()"), Some(3));
    assert_eq!(frequencies.get("return $val$;"), Some(2));
    assert_eq!(frequencies.get("open()"), None);
    assert_eq!(
        search
            .matches_encoded(encoded.as_slice(), &pattern, &cancel)
            .unwrap(),
        Some(true)
    );
}

#[test]
fn cancelled_search_returns_none() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let pattern = search.create(["$a + $b"], &cancel).unwrap().unwrap();
    let source = "x = a + b;\n".repeat(20_000);
    let tree = SyntaxTree::parse_source(&source).unwrap();
    let mut context = search.new_encoding_context();
    search.encode(&tree, &mut context, &cancel).unwrap().unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(search
        .match_tree(&tree, tree.root(), &pattern, &cancelled)
        .unwrap()
        .is_none());
    assert!(search
        .matches(&tree, tree.root(), &pattern, &cancelled)
        .unwrap()
        .is_none());
    assert!(search
        .matches_with_frequencies(context.encoded(), &pattern, &cancelled)
        .unwrap()
        .is_none());
    assert!(BulkSearchBuilder::new()
        .use_copy_finder()
        .build()
        .create(["$a + $b"], &cancelled)
        .unwrap()
        .is_none());

    // A token cancelled from another thread stops a running search.
    let shared = CancellationToken::new();
    let remote = shared.clone();
    std::thread::spawn(move || remote.cancel()).join().unwrap();
    assert!(search
        .match_tree(&tree, tree.root(), &pattern, &shared)
        .unwrap()
        .is_none());
}

const STRATEGY_SOURCE: &str = r#"
int sum = 0;
for (int i = 0; i < values.length; i++) {
    sum += values[i];
    if (sum > limit) {
        break;
    }
}
list.add(sum);
list.add(sum, 1);
String s = name.trim();
if (s.isEmpty()) {
    throw new IllegalStateException("empty");
}
result = a.equals(b) && b.equals(a);
"#;

#[test]
fn strategies_agree_after_verification() {
    init();
    let patterns = [
        "$l.add($e)",
        "$l.add($args$)",
        "$a.equals($b)",
        "if ($c) { $body$; }",
        "throw new $T($msg);",
        "$x += $y;",
        "$s.trim()",
        "for ($init$; $c; $update$) { $body$; }",
        "break;",
        "sum += values[i]; if ($c) $s;",
    ];
    let cancel = CancellationToken::new();
    let tree = SyntaxTree::parse_source(STRATEGY_SOURCE).unwrap();

    let nfa = BulkSearch::new();
    let pattern = nfa.create(patterns, &cancel).unwrap().unwrap();
    let from_nfa = verified_matches(&nfa, &tree, &pattern, &cancel);

    let copy_finder = BulkSearchBuilder::new().use_copy_finder().build();
    let pattern = copy_finder.create(patterns, &cancel).unwrap().unwrap();
    let exact = copy_finder
        .match_tree(&tree, tree.root(), &pattern, &cancel)
        .unwrap()
        .unwrap();

    assert_eq!(from_nfa, exact);
    assert_eq!(exact.len(), patterns.len());
    assert_eq!(exact.get("$l.add($args$)").map(<[_]>::len), Some(2));
    assert_eq!(exact.get("$l.add($e)").map(<[_]>::len), Some(1));
    assert_eq!(exact.get("$a.equals($b)").map(<[_]>::len), Some(2));
}

#[test]
fn compiling_twice_gives_the_same_results() {
    init();
    let patterns = ["$a.equals($b)", "return $v;", "$x = $x + 1;", "f($args$)"];
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let first = search.create(patterns, &cancel).unwrap().unwrap();
    let second = search.create(patterns, &cancel).unwrap().unwrap();
    let tree = SyntaxTree::parse_source(
        "x = x + 1; f(); f(a.equals(b)); y = y + 2; if (ok) return c.equals(d);",
    )
    .unwrap();
    let a = search
        .match_tree(&tree, tree.root(), &first, &cancel)
        .unwrap()
        .unwrap();
    let b = search
        .match_tree(&tree, tree.root(), &second, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);
}

#[test]
fn search_below_a_subtree() {
    init();
    let search = BulkSearch::new();
    let cancel = CancellationToken::new();
    let pattern = search.create(["close()"], &cancel).unwrap().unwrap();
    let tree = SyntaxTree::parse_source("close(); if (x) { close(); close(); }").unwrap();
    let block = tree.children(tree.root())[1];
    let occurrences = search
        .match_tree(&tree, block, &pattern, &cancel)
        .unwrap()
        .unwrap();
    assert_eq!(occurrences.total(), 2);
    assert!(occurrences
        .get("close()")
        .unwrap()
        .iter()
        .all(|id| tree.span(block).contains(&tree.span(*id))));
}
