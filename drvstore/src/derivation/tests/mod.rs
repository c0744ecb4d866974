use crate::aterm;
use crate::derivation::{
    hash_placeholder, Derivation, DerivationError, Field, OutputPathError, OutputReference,
    OutputType, ParseErrorKind,
};
use crate::nixhash::{CAHash, HashAlgo, IngestionMethod, NixHash};
use crate::store_path::{self, StoreDirectory, StorePath};
use bstr::BStr;
use hex_literal::hex;
use lazy_static::lazy_static;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::collections::{BTreeMap, BTreeSet};

const HELLO_ATERM: &str = r#"Derive([("out","/nix/store/3fhdhfqli6qm669f7sz8d8v6xz24zrqc-hello","sha256","2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")],[],[],"x86_64-linux","/bin/sh",["-c","echo hi"],[("out","/1rz4g4znpzjwh1xymhjpm42vipw92pr73vdgl6xs1hycac8kf2n9")])"#;

const BAR_ATERM: &str = r#"Derive([("out","/nix/store/4q0pg5zpfmznxscq3avycvf9xdvx50n3-bar","r:sha256","08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba")],[],[],":",":",[],[("builder",":"),("name","bar"),("out","/nix/store/4q0pg5zpfmznxscq3avycvf9xdvx50n3-bar"),("outputHash","08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba"),("outputHashAlgo","sha256"),("outputHashMode","recursive"),("system",":")])"#;

lazy_static! {
    static ref STORE_DIR: StoreDirectory = StoreDirectory::default();
    static ref HELLO: Derivation = {
        let mut drv = Derivation::new(STORE_DIR.clone(), "hello");
        drv.system = "x86_64-linux".into();
        drv.builder = "/bin/sh".into();
        drv.arguments = vec!["-c".into(), "echo hi".into()];
        drv.environment
            .insert("out".into(), hash_placeholder("out"));
        drv.outputs.insert(
            "out".into(),
            Some(OutputType::fixed(CAHash::Flat(NixHash::Sha256(hex!(
                "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
            ))))),
        );
        drv
    };
    static ref INPUT_DRV: StorePath =
        StorePath::from_absolute_path("/nix/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv")
            .unwrap();
    static ref INPUT_SRC: StorePath =
        StorePath::from_absolute_path("/nix/store/dxwkwjzdaq7ka55pkk252gh32bgpmql4-foo").unwrap();
}

fn parse(aterm: &str) -> Result<Derivation, crate::derivation::ParseError> {
    Derivation::from_aterm_bytes(STORE_DIR.clone(), "hello", aterm.as_bytes())
}

#[test]
fn hello_marshal() {
    let aterm = HELLO.to_aterm_bytes().expect("must serialize");

    assert_eq!(BStr::new(HELLO_ATERM), BStr::new(&aterm));
    assert!(!aterm.contains(&b'\n'), "single line");
}

#[test]
fn hello_output_path() {
    let path = HELLO.output_path("out").expect("must have a path");

    assert_eq!("hello", path.name());
    assert_eq!(
        "/nix/store/3fhdhfqli6qm669f7sz8d8v6xz24zrqc-hello",
        path.to_absolute_path()
    );
    assert_eq!(path, HELLO.output_path("out").unwrap(), "deterministic");
}

#[test]
fn hello_parse() {
    let drv = parse(HELLO_ATERM).expect("must parse");
    assert_eq!(*HELLO, drv);
}

#[test]
fn hello_export() {
    let (_, trailer) = HELLO.export(HashAlgo::Sha256).expect("must export");

    assert_eq!(
        "/nix/store/q4wfldbwkjamxc126s2q6brwd17v8gji-hello.drv",
        trailer.store_path.to_absolute_path()
    );
    assert_eq!(Some("hello"), trailer.store_path.derivation_name());
}

#[test]
fn non_default_output_path() {
    let mut drv = HELLO.clone();
    let out = drv.outputs.remove("out").unwrap();
    drv.outputs.insert("dev".into(), out);

    assert_eq!(
        "/nix/store/z94nm08z2ssjxx80xyr50biz6y1kx1q1-hello-dev",
        drv.output_path("dev").unwrap().to_absolute_path()
    );
}

#[test]
fn other_store_dir() {
    let dir = StoreDirectory::new("/gnu/store").unwrap();
    let drv = Derivation {
        dir: dir.clone(),
        ..HELLO.clone()
    };

    let path = drv.output_path("out").unwrap();
    assert_eq!(&dir, path.dir());
    assert_eq!(
        "/gnu/store/wj47a50kxs0sp14zibkqk1kknnx8ql0r-hello",
        path.to_absolute_path()
    );

    let aterm = drv.to_aterm_bytes().unwrap();
    assert_eq!(
        drv,
        Derivation::from_aterm_bytes(dir, "hello", &aterm).unwrap()
    );
}

#[test]
fn bar_roundtrip() {
    let drv = Derivation::from_aterm_bytes(STORE_DIR.clone(), "bar", BAR_ATERM.as_bytes())
        .expect("must parse");

    assert_eq!(
        Some(&Some(OutputType::fixed(CAHash::Nar(NixHash::Sha256(hex!(
            "08813cbee9903c62be4c5027726a418a300da4500b2d369d3af9286f4815ceba"
        )))))),
        drv.outputs.get("out")
    );
    assert_eq!(
        BStr::new(BAR_ATERM),
        BStr::new(&drv.to_aterm_bytes().unwrap())
    );

    let (_, trailer) = drv.export(HashAlgo::Sha256).unwrap();
    assert_eq!(
        "/nix/store/0hm2f1psjpcwg8fijsmr4wwxrx59s092-bar.drv",
        trailer.store_path.to_absolute_path()
    );
}

#[test]
fn floating_output() {
    let drv = parse(
        r#"Derive([("out","","r:sha256","")],[],[],"x86_64-linux","/bin/sh",[],[("out","")])"#,
    )
    .expect("must parse");

    let output = drv.outputs["out"].as_ref().expect("must have a type");
    assert!(output.is_floating());
    assert_eq!(IngestionMethod::Recursive, output.method());
    assert_eq!(HashAlgo::Sha256, output.hash_algo());

    assert_eq!(
        Err(OutputPathError::NotFixed("out".into())),
        drv.output_path("out")
    );
    assert_eq!(
        Err(OutputPathError::NoSuchOutput("dev".into())),
        drv.output_path("dev")
    );
}

#[test]
fn unspecified_output() {
    let mut drv = HELLO.clone();
    drv.outputs.insert("out".into(), None);

    let aterm = drv.to_aterm_bytes().unwrap();
    assert!(BStr::new(&aterm).starts_with(br#"Derive([("out","","","")],"#));
    assert_eq!(
        Err(OutputPathError::NotFixed("out".into())),
        drv.output_path("out")
    );

    assert_eq!(drv, parse(std::str::from_utf8(&aterm).unwrap()).unwrap());
}

#[test]
fn hash_length_mismatch() {
    // a sha1 digest, declared as sha256.
    let err = parse(
        r#"Derive([("out","/nix/store/3fhdhfqli6qm669f7sz8d8v6xz24zrqc-hello","sha256","0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33")],[],[],"x","/bin/sh",[],[])"#,
    )
    .expect_err("must fail");

    assert_eq!(Field::Outputs, err.field);
    assert!(matches!(err.kind, ParseErrorKind::Hash { ref output, .. } if output == "out"));
}

#[rstest]
#[case::duplicate_output(
    r#"Derive([("out","","sha256",""),("out","","sha1","")],[],[],"x","/bin/sh",[],[])"#,
    Field::Outputs,
    ParseErrorKind::DuplicateOutput("out".into())
)]
#[case::duplicate_env(
    r#"Derive([],[],[],"x","/bin/sh",[],[("a","1"),("a","2")])"#,
    Field::Env,
    ParseErrorKind::DuplicateEnv("a".into())
)]
#[case::invalid_output_name(
    r#"Derive([("a!b","","sha256","")],[],[],"x","/bin/sh",[],[])"#,
    Field::Outputs,
    ParseErrorKind::InvalidOutputName("a!b".into())
)]
#[case::unknown_output_type(
    r#"Derive([("out","/nix/store/3fhdhfqli6qm669f7sz8d8v6xz24zrqc-hello","sha256","")],[],[],"x","/bin/sh",[],[])"#,
    Field::Outputs,
    ParseErrorKind::UnknownOutputType("out".into())
)]
#[case::missing_constructor(r#"Drv([],[],[],"x","/bin/sh",[],[])"#, Field::Tuple, ParseErrorKind::MissingConstructor)]
#[case::trailing_data(r#"Derive([],[],[],"x","/bin/sh",[],[])x"#, Field::Tuple, ParseErrorKind::TrailingData)]
#[case::trailing_newline("Derive([],[],[],\"x\",\"/bin/sh\",[],[])\n", Field::Tuple, ParseErrorKind::TrailingData)]
#[case::missing_separator(
    r#"Derive([][][]"x""/bin/sh"[][])"#,
    Field::InputDerivations,
    ParseErrorKind::Token(aterm::Error::MissingSeparator)
)]
#[case::leading_comma(
    r#"Derive(,[],[],[],"x","/bin/sh",[],[])"#,
    Field::Outputs,
    ParseErrorKind::Token(aterm::Error::UnexpectedSeparator)
)]
#[case::doubled_comma(
    r#"Derive([],,[],[],"x","/bin/sh",[],[])"#,
    Field::InputDerivations,
    ParseErrorKind::Token(aterm::Error::UnexpectedSeparator)
)]
#[case::trailing_comma_in_list(
    r#"Derive([],[],[],"x","/bin/sh",["a",],[])"#,
    Field::Args,
    ParseErrorKind::Token(aterm::Error::UnexpectedSeparator)
)]
#[case::trailing_comma_in_tuple(
    r#"Derive([],[],[],"x","/bin/sh",[],[],)"#,
    Field::Tuple,
    ParseErrorKind::Token(aterm::Error::UnexpectedSeparator)
)]
#[case::missing_separator_in_env(
    r#"Derive([],[],[],"x","/bin/sh",[],[("a""1")])"#,
    Field::Env,
    ParseErrorKind::Token(aterm::Error::MissingSeparator)
)]
#[case::whitespace(
    r#"Derive( [],[],[],"x","/bin/sh",[],[])"#,
    Field::Outputs,
    ParseErrorKind::Token(aterm::Error::UnexpectedByte(b' '))
)]
fn parse_fail(#[case] aterm: &str, #[case] field: Field, #[case] kind: ParseErrorKind) {
    let err = parse(aterm).expect_err("must fail");

    assert_eq!("hello", err.name);
    assert_eq!(field, err.field);
    assert_eq!(kind, err.kind);
}

#[rstest]
#[case::input_derivation(
    r#"Derive([],[("/gnu/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv",["out"])],[],"x","/bin/sh",[],[])"#,
    Field::InputDerivations
)]
#[case::input_source(
    r#"Derive([],[],["/gnu/store/dxwkwjzdaq7ka55pkk252gh32bgpmql4-foo"],"x","/bin/sh",[],[])"#,
    Field::InputSources
)]
fn parse_other_store_dir(#[case] aterm: &str, #[case] field: Field) {
    let err = parse(aterm).expect_err("must fail");

    assert_eq!(field, err.field);
    match err.kind {
        ParseErrorKind::StorePath {
            source: store_path::Error::UnexpectedStoreDir { expected, got },
            ..
        } => {
            assert_eq!(*STORE_DIR, expected);
            assert_eq!("/gnu/store", got.as_str());
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[rstest]
#[case::caret("a^b")]
#[case::bang("a!b")]
#[case::empty("")]
fn marshal_invalid_output_name(#[case] output_name: &str) {
    let mut drv = HELLO.clone();
    drv.outputs
        .insert(output_name.into(), Some(OutputType::flat_file_floating(HashAlgo::Sha256)));

    match drv.to_aterm_bytes() {
        Err(DerivationError::InvalidOutputName { name, output }) => {
            assert_eq!("hello", name);
            assert_eq!(output_name, output);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn marshal_missing_name() {
    let drv = Derivation {
        name: String::new(),
        ..HELLO.clone()
    };

    let mut buf = Vec::new();
    assert!(matches!(
        drv.serialize(&mut buf),
        Err(DerivationError::MissingName(_))
    ));
    assert!(buf.is_empty(), "nothing written");
}

#[rstest]
#[case::input_source(&["/gnu/store/dxwkwjzdaq7ka55pkk252gh32bgpmql4-foo"], &[])]
#[case::input_derivation(&[], &["/gnu/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv"])]
fn marshal_other_store_dir(#[case] input_sources: &[&str], #[case] input_derivations: &[&str]) {
    let mut drv = HELLO.clone();
    for path in input_sources {
        drv.input_sources
            .insert(StorePath::from_absolute_path(path).unwrap());
    }
    for path in input_derivations {
        drv.input_derivations.insert(
            StorePath::from_absolute_path(path).unwrap(),
            BTreeSet::from(["out".to_string()]),
        );
    }

    let mut buf = Vec::new();
    match drv.serialize(&mut buf) {
        Err(DerivationError::UnexpectedStoreDir { name, expected, got }) => {
            assert_eq!("hello", name);
            assert_eq!(*STORE_DIR, expected);
            assert_eq!("/gnu/store", got.as_str());
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(buf.is_empty(), "nothing written");
}

#[test]
fn canonical_order() {
    let mut drv = Derivation::new(STORE_DIR.clone(), "order");
    drv.system = "x".into();
    drv.builder = "/bin/sh".into();
    drv.arguments = vec!["z".into(), "a".into(), "z".into()];
    for (k, v) in [("zz", "1"), ("aa", "2"), ("mm", "3")] {
        drv.environment.insert(k.into(), v.into());
    }
    for name in ["out", "dev", "bin"] {
        drv.outputs.insert(
            name.into(),
            Some(OutputType::recursive_file_floating(HashAlgo::Sha256)),
        );
    }
    drv.input_derivations.insert(
        INPUT_DRV.clone(),
        ["out", "dev", "bin"].into_iter().map(String::from).collect(),
    );
    drv.input_sources.insert(INPUT_SRC.clone());

    let aterm = drv.to_aterm_bytes().unwrap();
    assert_eq!(
        BStr::new(
            r#"Derive([("bin","","r:sha256",""),("dev","","r:sha256",""),("out","","r:sha256","")],[("/nix/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv",["bin","dev","out"])],["/nix/store/dxwkwjzdaq7ka55pkk252gh32bgpmql4-foo"],"x","/bin/sh",["z","a","z"],[("aa","2"),("mm","3"),("zz","1")])"#
        ),
        BStr::new(&aterm)
    );
    assert_eq!(aterm, drv.to_aterm_bytes().unwrap(), "deterministic");
}

#[test]
fn input_derivation_output_names_merge() {
    let drv = parse(
        r#"Derive([],[("/nix/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv",["out","dev","out"])],[],"x","/bin/sh",[],[])"#,
    )
    .expect("must parse");

    assert_eq!(
        vec![
            OutputReference {
                drv_path: INPUT_DRV.clone(),
                output_name: "dev".into()
            },
            OutputReference {
                drv_path: INPUT_DRV.clone(),
                output_name: "out".into()
            },
        ],
        drv.input_derivation_outputs().collect::<Vec<_>>()
    );
}

#[test]
fn references() {
    let mut drv = HELLO.clone();
    drv.input_sources.insert(INPUT_SRC.clone());
    drv.input_derivations
        .insert(INPUT_DRV.clone(), BTreeSet::from(["out".to_string()]));

    let references = drv.references();
    assert!(!references.self_reference);
    assert_eq!(
        BTreeSet::from([INPUT_DRV.clone(), INPUT_SRC.clone()]),
        references.others
    );
}

#[test]
fn clone_is_independent() {
    let mut drv = HELLO.clone();
    drv.arguments.push("extra".into());
    drv.environment.insert("extra".into(), "1".into());
    drv.outputs.insert("dev".into(), None);

    assert_eq!(2, HELLO.arguments.len());
    assert!(!HELLO.environment.contains_key("extra"));
    assert!(!HELLO.outputs.contains_key("dev"));
}

#[test]
fn json_roundtrip() {
    let mut drv = HELLO.clone();
    drv.input_sources.insert(INPUT_SRC.clone());
    drv.input_derivations
        .insert(INPUT_DRV.clone(), BTreeSet::from(["out".to_string()]));
    drv.outputs.insert(
        "dev".into(),
        Some(OutputType::recursive_file_floating(HashAlgo::Sha512)),
    );

    let json = serde_json::to_value(&drv).expect("must serialize");
    assert_eq!("/nix/store", json["storeDir"]);
    assert_eq!("r:sha512", json["outputs"]["dev"]["hashAlgo"]);
    assert_eq!(
        serde_json::json!(["out"]),
        json["inputDrvs"]["/nix/store/5xd714cbfnkz02h2vbsj4fm03x3f15nf-baz.drv"]
    );

    let drv2: Derivation = serde_json::from_value(json).expect("must deserialize");
    assert_eq!(drv, drv2);
}

fn arb_output_type() -> impl Strategy<Value = Option<OutputType>> {
    let algo = prop_oneof![
        Just(HashAlgo::Md5),
        Just(HashAlgo::Sha1),
        Just(HashAlgo::Sha256),
        Just(HashAlgo::Sha512),
    ];
    let method = prop_oneof![Just(IngestionMethod::Flat), Just(IngestionMethod::Recursive)];

    prop_oneof![
        Just(None),
        (method, algo).prop_map(|(method, algo)| Some(OutputType::Floating { method, algo })),
        any::<[u8; 32]>().prop_map(|digest| Some(OutputType::fixed(CAHash::Nar(NixHash::Sha256(
            digest
        ))))),
        any::<[u8; 20]>()
            .prop_map(|digest| Some(OutputType::fixed(CAHash::Flat(NixHash::Sha1(digest))))),
    ]
}

fn arb_derivation() -> impl Strategy<Value = Derivation> {
    (
        "[a-z][a-z0-9.-]{0,12}",
        ".*",
        ".*",
        prop::collection::vec(".*", 0..4),
        prop::collection::btree_map(".*", ".*", 0..4),
        prop::collection::btree_map("[a-z]{1,6}", arb_output_type(), 0..3),
        prop::collection::btree_set(any::<[u8; 20]>(), 0..3),
        prop::collection::btree_map(
            any::<[u8; 20]>(),
            prop::collection::btree_set("[a-z]{1,6}", 1..3),
            0..3,
        ),
    )
        .prop_map(
            |(name, system, builder, arguments, environment, outputs, srcs, drvs)| {
                let dir = StoreDirectory::default();
                let path = |digest: [u8; 20], name: &str| {
                    StorePath::from_name_and_digest(dir.clone(), name, digest).unwrap()
                };

                Derivation {
                    input_sources: srcs.into_iter().map(|d| path(d, "src")).collect(),
                    input_derivations: drvs
                        .into_iter()
                        .map(|(d, outputs)| (path(d, "dep.drv"), outputs))
                        .collect::<BTreeMap<_, _>>(),
                    system,
                    builder,
                    arguments,
                    environment,
                    outputs,
                    ..Derivation::new(dir.clone(), name)
                }
            },
        )
}

proptest! {
    #[test]
    fn parse_marshal_roundtrip(drv in arb_derivation()) {
        let aterm = drv.to_aterm_bytes().expect("must serialize");
        let parsed = Derivation::from_aterm_bytes(drv.dir.clone(), drv.name.clone(), &aterm)
            .expect("must parse");

        prop_assert_eq!(&drv, &parsed);
        prop_assert_eq!(aterm, parsed.to_aterm_bytes().unwrap());
    }
}
