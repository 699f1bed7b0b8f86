// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lantern_db::Store;

pub fn write<DB>(db: &DB)
where
    DB: Store,
{
    let key = [1];
    let value = [1];
    db.write(key, value).unwrap();
}

pub fn read<DB>(db: &DB)
where
    DB: Store,
{
    let key = [0];
    let value = [1];
    db.write(key, value).unwrap();
    let res = db.read(key).unwrap().unwrap();
    assert_eq!(value.as_ref(), res.as_slice());
}

pub fn exists<DB>(db: &DB)
where
    DB: Store,
{
    let key = [0];
    let value = [1];
    db.write(key, value).unwrap();
    let res = db.exists(key).unwrap();
    assert!(res);
}

pub fn does_not_exist<DB>(db: &DB)
where
    DB: Store,
{
    let key = [0];
    let res = db.exists(key).unwrap();
    assert!(!res);
}

pub fn delete<DB>(db: &DB)
where
    DB: Store,
{
    let key = [0];
    let value = [1];
    db.write(key, value).unwrap();
    let res = db.exists(key).unwrap();
    assert!(res);
    db.delete(key).unwrap();
    let res = db.exists(key).unwrap();
    assert!(!res);
}

pub fn last<DB>(db: &DB)
where
    DB: Store,
{
    assert_eq!(db.last().unwrap(), None);
    db.write([0, 1], [10]).unwrap();
    db.write([0, 3], [30]).unwrap();
    db.write([0, 2], [20]).unwrap();
    let (key, value) = db.last().unwrap().unwrap();
    assert_eq!(key, vec![0, 3]);
    assert_eq!(value, vec![30]);
}

pub fn len<DB>(db: &DB)
where
    DB: Store,
{
    assert_eq!(db.len().unwrap(), 0);
    assert!(db.is_empty().unwrap());
    db.write([0], [0]).unwrap();
    db.write([1], [1]).unwrap();
    // overwrite must not grow the store
    db.write([1], [2]).unwrap();
    assert_eq!(db.len().unwrap(), 2);
}

pub fn iter_from<DB>(db: &DB)
where
    DB: Store,
{
    for i in 0u8..10 {
        db.write([0, i], [i]).unwrap();
    }
    let keys: Vec<Vec<u8>> = db
        .iter_from([0, 4])
        .unwrap()
        .map(|res| res.unwrap().0)
        .collect();
    let expected: Vec<Vec<u8>> = (4u8..10).map(|i| vec![0, i]).collect();
    assert_eq!(keys, expected);
}

pub fn bulk_write<DB>(db: &DB)
where
    DB: Store,
{
    let values = [([0], [0]), ([1], [1]), ([2], [2])];
    db.bulk_write(&values).unwrap();
    for (k, _) in values.iter() {
        let res = db.exists(*k).unwrap();
        assert!(res);
    }
}

pub fn bulk_delete<DB>(db: &DB)
where
    DB: Store,
{
    let keys = [[0], [1], [2]];
    let values = [([0], [0]), ([1], [1]), ([2], [2])];
    db.bulk_write(&values).unwrap();
    db.bulk_delete(&keys).unwrap();
    for k in keys.iter() {
        let res = db.exists(*k).unwrap();
        assert!(!res);
    }
}
