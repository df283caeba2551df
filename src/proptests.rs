use super::*;

use proptest::prelude::*;

use crate::encoding::{utf8_common_prefix_len, CodeReader, CodeWriter, MAX_GAMMA};

fn validate_list<S: ByteSource>(list: &FrontCodedList<S>) {
    let ratio = list.ratio() as u64;
    assert_eq!(
        list.pointers().len() as u64,
        list.len().div_ceil(ratio),
        "one pointer per full copy"
    );
    for w in list.pointers().windows(2) {
        assert!(w[0] < w[1], "pointers must be strictly increasing");
    }
    if let Some(&last) = list.pointers().last() {
        assert!(last < list.data().len());
    }
}

fn check_round_trip<T: AsRef<[u8]>>(
    strings: &[T],
    config: Config,
) -> std::result::Result<(), TestCaseError> {
    let list = FrontCodedList::from_strings(config, strings).unwrap();
    validate_list(&list);
    prop_assert_eq!(list.len(), strings.len() as u64);

    let mut buf = Vec::new();
    for (i, s) in strings.iter().enumerate() {
        let i = i as u64;
        prop_assert_eq!(list.get(i).unwrap(), s.as_ref());
        list.get_into(i, &mut buf).unwrap();
        prop_assert_eq!(buf.as_slice(), s.as_ref());
    }
    let decoded: Vec<Vec<u8>> = list.iter().collect::<Result<_>>().unwrap();
    prop_assert_eq!(decoded.len(), strings.len());
    for (d, s) in decoded.iter().zip(strings) {
        prop_assert_eq!(d.as_slice(), s.as_ref());
    }
    prop_assert!(list.get(list.len()).is_err());
    Ok(())
}

fn near_sorted(mut strings: Vec<String>) -> Vec<String> {
    strings.sort();
    strings
}

proptest! {
    #[test]
    fn prop_gamma_round_trip(values in prop::collection::vec(0..=MAX_GAMMA, 0..200)) {
        let mut w = CodeWriter::new(Vec::new());
        for &v in &values {
            w.write_gamma(v).unwrap();
        }
        let out = w.into_inner().unwrap();
        let mut r = CodeReader::new(&out);
        for &v in &values {
            prop_assert_eq!(r.read_gamma().unwrap(), v);
        }
        prop_assert!(r.at_padding_end());
    }

    #[test]
    fn prop_skip_agrees_with_read(
        values in prop::collection::vec(0u64..1_000_000, 1..100),
        skip in 0usize..100,
    ) {
        let skip = skip % values.len();
        let mut w = CodeWriter::new(Vec::new());
        for &v in &values {
            w.write_gamma(v).unwrap();
        }
        let out = w.into_inner().unwrap();

        let mut by_skip = CodeReader::new(&out);
        by_skip.skip_gammas(skip as u64).unwrap();
        let mut by_read = CodeReader::new(&out);
        for _ in 0..skip {
            by_read.read_gamma().unwrap();
        }
        prop_assert_eq!(by_skip.position(), by_read.position());
        prop_assert_eq!(by_skip.read_gamma().unwrap(), values[skip]);
    }

    #[test]
    fn prop_bytes_round_trip(
        strings in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..24), 0..60),
        ratio in 1u32..12,
    ) {
        check_round_trip(&strings, Config::new(ratio).utf8(false))?;
    }

    #[test]
    fn prop_unsorted_text_round_trip(
        strings in prop::collection::vec("[a-c]{0,6}", 0..60),
        ratio in 1u32..12,
    ) {
        check_round_trip(&strings, Config::new(ratio))?;
    }

    #[test]
    fn prop_sorted_text_round_trip(
        strings in prop::collection::vec("(ab|abc|b|é|\u{1F600}){0,5}", 0..80).prop_map(near_sorted),
        ratio in 1u32..20,
    ) {
        check_round_trip(&strings, Config::new(ratio))?;
    }

    #[test]
    fn prop_unicode_round_trip(
        strings in prop::collection::vec(any::<String>(), 0..40),
        ratio in 1u32..10,
    ) {
        check_round_trip(&strings, Config::new(ratio))?;
    }

    #[test]
    fn prop_utf8_prefix_on_boundary(a in any::<String>(), b in any::<String>()) {
        let n = utf8_common_prefix_len(a.as_bytes(), b.as_bytes());
        prop_assert!(a.is_char_boundary(n));
        prop_assert!(b.is_char_boundary(n));
        prop_assert_eq!(&a.as_bytes()[..n], &b.as_bytes()[..n]);
    }

    #[test]
    fn prop_gamma_list_matches_values(
        values in prop::collection::vec(0..=MAX_GAMMA, 0..150),
        step in 1u32..40,
        probes in prop::collection::vec(any::<prop::sample::Index>(), 0..40),
    ) {
        let mut builder = GammaStreamBuilder::new();
        for &v in &values {
            builder.push(v).unwrap();
        }
        let (len, data) = builder.finish().unwrap();
        let mut list = SemiExternalGammaList::build(data, step, None).unwrap();
        prop_assert_eq!(list.len(), len);
        if !values.is_empty() {
            for probe in probes {
                let i = probe.index(values.len());
                prop_assert_eq!(list.get(i as u64).unwrap(), values[i]);
            }
        }
    }
}
