use super::*;

fn reference_strips() -> Vec<StripSpec> {
    vec![
        StripSpec::gradient("left-outer", 0, 21, Side::Left),
        StripSpec::gradient("left-middle", 57, 22, Side::Left),
        StripSpec::gradient("left-inner", 58, 84, Side::Left),
        StripSpec::solid("right-inner", 103, 85, Side::Top, 5),
        StripSpec::solid("right-middle", 104, 128, Side::Top, 6),
        StripSpec::solid("right-outer", 140, 129, Side::Right, 0),
    ]
}

fn reference_mapper(brightness: f64, white: u8) -> ColorMapper {
    let topology = LedTopology::new(reference_strips()).expect("topology");
    ColorMapper::new(topology, brightness, white).expect("mapper")
}

fn ramp(len: usize) -> Vec<Rgb> {
    (0..len)
        .map(|i| {
            let v = (i * 255 / (len.max(2) - 1)) as u8;
            Rgb::new(v, 255 - v, v / 2)
        })
        .collect()
}

fn reference_snapshot() -> ZoneSnapshot {
    ZoneSnapshot {
        left: ramp(4),
        top: (0..9).map(|i| Rgb::new(i * 20, 100, 200)).collect(),
        right: vec![Rgb::new(9, 8, 7), Rgb::new(1, 1, 1)],
        bottom: Vec::new(),
    }
}

#[test]
fn reference_layout_spans_141_leds() {
    let topology = LedTopology::new(reference_strips()).expect("topology");
    assert_eq!(topology.led_count(), 141);
    assert_eq!(topology.strips()[1].len(), 36);
    assert_eq!(topology.strips()[5].len(), 12);
}

#[test]
fn descending_strip_walks_from_start() {
    let strip = StripSpec::gradient("down", 5, 2, Side::Left);
    assert_eq!(strip.indices().collect::<Vec<_>>(), vec![5, 4, 3, 2]);
    assert_eq!(strip.len(), 4);
    assert_eq!(strip.max_index(), 5);
}

#[test]
fn overlapping_strips_are_rejected() {
    let err = LedTopology::new(vec![
        StripSpec::gradient("a", 0, 5, Side::Left),
        StripSpec::solid("b", 9, 5, Side::Top, 0),
    ])
    .expect_err("overlap");
    assert_eq!(
        err,
        InvalidInput::OverlappingStrip {
            strip: "b".to_string(),
            index: 5
        }
    );
}

#[test]
fn oversized_strip_is_rejected_without_allocating() {
    let err = LedTopology::new(vec![
        StripSpec::gradient("ok", 0, 9, Side::Left),
        StripSpec::gradient("huge", 10, 1usize << 40, Side::Left),
    ])
    .expect_err("too many leds");
    assert_eq!(
        err,
        InvalidInput::TooManyLeds {
            strip: "huge".to_string(),
            index: 1usize << 40,
            max: MAX_LED_COUNT,
        }
    );

    let edge = LedTopology::new(vec![StripSpec::gradient(
        "edge",
        MAX_LED_COUNT - 1,
        0,
        Side::Left,
    )])
    .expect("largest layout");
    assert_eq!(edge.led_count(), MAX_LED_COUNT);
    let over = StripSpec::gradient("over", 0, MAX_LED_COUNT, Side::Left);
    assert!(LedTopology::new(vec![over]).is_err());
}

#[test]
fn empty_topology_is_rejected() {
    assert_eq!(
        LedTopology::new(Vec::new()).expect_err("empty"),
        InvalidInput::EmptyTopology
    );
}

#[test]
fn brightness_outside_unit_range_is_rejected() {
    let topology = LedTopology::new(reference_strips()).expect("topology");
    assert_eq!(
        ColorMapper::new(topology.clone(), 1.5, 0).expect_err("too bright"),
        InvalidInput::Brightness(1.5)
    );
    assert!(ColorMapper::new(topology, f64::NAN, 0).is_err());
}

#[test]
fn resample_interpolates_at_fractional_positions() {
    let gradient = resample(&[Rgb::new(0, 0, 0), Rgb::new(100, 0, 0)], 4, 1.0, 7);
    let reds: Vec<u8> = gradient.iter().map(|c| c.r).collect();
    assert_eq!(reds, vec![0, 25, 50, 75]);
    assert!(gradient.iter().all(|c| c.w == 7));
}

#[test]
fn resample_single_source_fills_target() {
    let gradient = resample(&[Rgb::new(200, 100, 50)], 3, 0.5, 1);
    assert_eq!(gradient, vec![LedColor::new(100, 50, 25, 1); 3]);
}

#[test]
fn resample_identity_reproduces_source() {
    let source = ramp(6);
    let gradient = resample(&source, 6, 1.0, 0);
    let expected: Vec<LedColor> = source
        .iter()
        .map(|c| LedColor::new(c.r, c.g, c.b, 0))
        .collect();
    assert_eq!(gradient, expected);
}

#[test]
fn resample_preserves_monotonic_channels() {
    let source = [0u8, 50, 100, 200, 255].map(|r| Rgb::new(r, 0, 0));
    for target in [2, 7, 36, 100] {
        let gradient = resample(&source, target, 0.4, 0);
        assert_eq!(gradient.len(), target);
        assert!(
            gradient.windows(2).all(|pair| pair[0].r <= pair[1].r),
            "target {target} not monotonic"
        );
    }
}

#[test]
fn identity_mapping_reverses_onto_tallest_strip() {
    let source = ramp(6);
    let topology = LedTopology::new(vec![StripSpec::gradient("solo", 0, 5, Side::Left)])
        .expect("topology");
    let mapper = ColorMapper::new(topology, 1.0, 0).expect("mapper");
    let frame = mapper
        .map(&ZoneSnapshot {
            left: source.clone(),
            ..ZoneSnapshot::default()
        })
        .expect("map");

    let mut reds: Vec<u8> = frame.pixels().iter().map(|c| c.r).collect();
    reds.reverse();
    assert_eq!(reds, source.iter().map(|c| c.r).collect::<Vec<_>>());
}

#[test]
fn gradient_strips_agree_at_bottom_edge() {
    let mapper = reference_mapper(0.4, 50);
    let frame = mapper.map(&reference_snapshot()).expect("map");

    let bottom = frame.get(22).expect("tallest bottom");
    assert_eq!(frame.get(21), Some(bottom));
    assert_eq!(frame.get(84), Some(bottom));
    assert_eq!(
        bottom,
        LedColor::scaled(reference_snapshot().left[0], 0.4, 50)
    );
}

#[test]
fn tallest_strip_starts_with_last_gradient_sample() {
    let mapper = reference_mapper(1.0, 0);
    let snapshot = reference_snapshot();
    let gradient = resample(&snapshot.left, 36, 1.0, 0);
    let frame = mapper.map(&snapshot).expect("map");

    assert_eq!(frame.get(57), Some(gradient[35]));
    assert_eq!(frame.get(22), Some(gradient[0]));
}

#[test]
fn shorter_strip_reads_bottom_portion_of_gradient() {
    let mapper = reference_mapper(1.0, 0);
    let snapshot = reference_snapshot();
    let gradient = resample(&snapshot.left, 36, 1.0, 0);
    let frame = mapper.map(&snapshot).expect("map");

    // left-outer: 22 LEDs against 36, position 0 reads floor(21 * 22/36 * 35/21) = 21
    assert_eq!(bottom_aligned_index(22, 36, 0), 21);
    assert_eq!(frame.get(0), Some(gradient[21]));
    assert_eq!(frame.get(21), Some(gradient[0]));
}

#[test]
fn bottom_aligned_index_stays_in_range() {
    for tallest in 1..40 {
        for strip in 1..=tallest {
            for position in 0..strip {
                assert!(bottom_aligned_index(strip, tallest, position) < tallest);
            }
        }
    }
}

#[test]
fn single_led_strip_takes_full_bottom_sample() {
    // Literal `T-1` rule: a one-LED strip shows the last gradient sample,
    // which is the top of the tallest strip, not the shared bottom edge.
    assert_eq!(bottom_aligned_index(1, 10, 0), 9);

    let topology = LedTopology::new(vec![
        StripSpec::gradient("tall", 0, 9, Side::Left),
        StripSpec::gradient("dot", 10, 10, Side::Left),
    ])
    .expect("topology");
    let mapper = ColorMapper::new(topology, 1.0, 0).expect("mapper");
    let snapshot = ZoneSnapshot {
        left: ramp(3),
        ..ZoneSnapshot::default()
    };
    let gradient = resample(&snapshot.left, 10, 1.0, 0);
    let frame = mapper.map(&snapshot).expect("map");
    assert_eq!(frame.get(10), Some(gradient[9]));
}

#[test]
fn solid_strips_fill_uniformly_from_configured_zone() {
    let mapper = reference_mapper(0.5, 50);
    let snapshot = reference_snapshot();
    let frame = mapper.map(&snapshot).expect("map");

    let expected = LedColor::scaled(snapshot.top[5], 0.5, 50);
    assert!((85..=103).all(|i| frame.get(i) == Some(expected)));
    let expected = LedColor::scaled(snapshot.top[6], 0.5, 50);
    assert!((104..=128).all(|i| frame.get(i) == Some(expected)));
    let expected = LedColor::scaled(snapshot.right[0], 0.5, 50);
    assert!((129..=140).all(|i| frame.get(i) == Some(expected)));
}

#[test]
fn zero_brightness_blanks_rgb_but_keeps_white() {
    let mapper = reference_mapper(0.0, 50);
    let frame = mapper.map(&reference_snapshot()).expect("map");
    assert!(frame
        .pixels()
        .iter()
        .all(|c| (c.r, c.g, c.b, c.w) == (0, 0, 0, 50)));
}

#[test]
fn uncovered_leds_keep_previous_value() {
    let topology = LedTopology::new(vec![
        StripSpec::gradient("low", 0, 2, Side::Left),
        StripSpec::solid("high", 5, 6, Side::Right, 0),
    ])
    .expect("topology");
    let mapper = ColorMapper::new(topology, 1.0, 0).expect("mapper");
    let marker = LedColor::new(1, 2, 3, 4);
    let mut frame = LedFrame::filled(7, marker);

    mapper
        .map_into(
            &ZoneSnapshot {
                left: ramp(2),
                right: vec![Rgb::new(9, 9, 9)],
                ..ZoneSnapshot::default()
            },
            &mut frame,
        )
        .expect("map");

    assert_eq!(frame.get(3), Some(marker));
    assert_eq!(frame.get(4), Some(marker));
    assert_eq!(frame.get(5), Some(LedColor::new(9, 9, 9, 0)));
}

#[test]
fn fresh_frames_start_off_outside_strips() {
    let topology = LedTopology::new(vec![StripSpec::solid("far", 3, 4, Side::Top, 0)])
        .expect("topology");
    let mapper = ColorMapper::new(topology, 1.0, 0).expect("mapper");
    let frame = mapper
        .map(&ZoneSnapshot {
            top: vec![Rgb::new(5, 5, 5)],
            ..ZoneSnapshot::default()
        })
        .expect("map");
    assert_eq!(frame.len(), 5);
    assert_eq!(frame.get(0), Some(LedColor::OFF));
}

#[test]
fn missing_gradient_zones_are_invalid_input() {
    let mapper = reference_mapper(1.0, 0);
    let mut snapshot = reference_snapshot();
    snapshot.left.clear();
    assert_eq!(
        mapper.map(&snapshot).expect_err("no left zones"),
        InvalidInput::MissingZones {
            strip: "left-middle".to_string(),
            side: Side::Left
        }
    );
}

#[test]
fn short_zone_list_is_invalid_input_and_leaves_frame_untouched() {
    let mapper = reference_mapper(1.0, 0);
    let mut snapshot = reference_snapshot();
    snapshot.top.truncate(6);

    let marker = LedColor::new(7, 7, 7, 7);
    let mut frame = LedFrame::filled(141, marker);
    let err = mapper.map_into(&snapshot, &mut frame).expect_err("zone 6");

    assert_eq!(
        err,
        InvalidInput::ZoneOutOfRange {
            strip: "right-middle".to_string(),
            side: Side::Top,
            zone: 6,
            available: 6
        }
    );
    assert!(frame.pixels().iter().all(|c| *c == marker));
}

#[test]
fn short_frame_is_invalid_input() {
    let mapper = reference_mapper(1.0, 0);
    let mut frame = LedFrame::off(100);
    assert_eq!(
        mapper
            .map_into(&reference_snapshot(), &mut frame)
            .expect_err("short"),
        InvalidInput::FrameTooShort {
            expected: 141,
            actual: 100
        }
    );
}

#[test]
fn strips_deserialize_from_toml_records() {
    #[derive(Deserialize)]
    struct Layout {
        strips: Vec<StripSpec>,
    }

    let layout: Layout = toml::from_str(
        r#"
        [[strips]]
        name = "left-middle"
        start = 57
        end = 22
        side = "left"
        mode = "gradient"

        [[strips]]
        name = "right-outer"
        start = 140
        end = 129
        side = "right"
        mode = "solid"
        zone = 0
        "#,
    )
    .expect("toml");

    assert_eq!(
        layout.strips,
        vec![
            StripSpec::gradient("left-middle", 57, 22, Side::Left),
            StripSpec::solid("right-outer", 140, 129, Side::Right, 0),
        ]
    );
}
