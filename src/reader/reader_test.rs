use super::*;

#[test]
fn test_reader_feed_get_commit() -> Result<()> {
    let mut rd = Reader::new(64);

    rd.feed(vec![1, 2, 3, 4, 5])?;
    assert!(rd.is_attached());

    let got = rd.get(3)?.to_vec();
    assert_eq!(vec![1, 2, 3], got);
    rd.commit();

    let got = rd.get(10)?.to_vec();
    assert_eq!(vec![4, 5], got, "short reads serve what is left");
    assert_eq!(5, rd.pending(), "shortfall of the last get is remembered");

    rd.commit();
    assert_eq!(0, rd.reclaim(), "fully drained reader reclaims clean");
    assert!(!rd.is_attached());

    Ok(())
}

#[test]
fn test_reader_double_feed_fails() -> Result<()> {
    let mut rd = Reader::new(64);
    rd.feed(vec![1])?;
    assert_eq!(Err(Error::ErrInvalidArgs), rd.feed(vec![2]));
    Ok(())
}

#[test]
fn test_reader_get_without_data() {
    let mut rd = Reader::new(64);
    assert_eq!(Err(Error::ErrOutOfData), rd.get(1).map(<[u8]>::to_vec));
}

#[test]
fn test_reader_pause_resume_contiguous() -> Result<()> {
    let mut rd = Reader::new(64);

    // Consume 7 of 10, leave 3 behind.
    rd.feed(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9])?;
    let got = rd.get(7)?.to_vec();
    assert_eq!((0u8..7).collect::<Vec<u8>>(), got);
    rd.commit();
    assert_eq!(3, rd.reclaim());
    assert_eq!(3, rd.paused_len());

    // The next record makes the tail contiguous with the new bytes.
    rd.feed(vec![10, 11, 12, 13, 14])?;
    let got = rd.get(8)?.to_vec();
    assert_eq!(vec![7, 8, 9, 10, 11, 12, 13, 14], got);
    rd.commit();
    assert_eq!(0, rd.reclaim());

    Ok(())
}

#[test]
fn test_reader_uncommitted_handouts_survive_reclaim() -> Result<()> {
    let mut rd = Reader::new(64);

    rd.feed(vec![1, 2, 3, 4])?;
    let _ = rd.get(3)?;
    // Nothing committed: everything must be preserved.
    assert_eq!(4, rd.reclaim());

    rd.feed(vec![5])?;
    let got = rd.get(5)?.to_vec();
    assert_eq!(vec![1, 2, 3, 4, 5], got);

    Ok(())
}

#[test]
fn test_reader_rewind_reserves_uncommitted() -> Result<()> {
    let mut rd = Reader::new(64);

    rd.feed(vec![1, 2, 3, 4])?;
    let _ = rd.get(2)?;
    rd.commit();
    let _ = rd.get(2)?;
    rd.rewind();

    let got = rd.get(2)?.to_vec();
    assert_eq!(vec![3, 4], got, "rewound bytes are served again");

    Ok(())
}

#[test]
fn test_reader_accumulator_capacity() -> Result<()> {
    let mut rd = Reader::new(4);

    rd.feed(vec![1, 2, 3])?;
    assert_eq!(3, rd.reclaim());

    // 3 held + 2 fed exceeds the capacity of 4.
    assert_eq!(Err(Error::ErrBufferTooSmall), rd.feed(vec![4, 5]));

    Ok(())
}
