mod util;
use util::*;

use bytemuck::{Pod, Zeroable};
use dist_la::comm::collective::{ReduceOp, all_gather_pod, all_reduce_f64, all_to_all_pod, gather_pod};
use dist_la::comm::wire::cast_slice;
use dist_la::comm::{CommTag, Communicator, NoComm, RayonComm, Wait};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
struct WireU64 {
    x: u64,
}

#[test]
fn no_comm_is_nop() {
    let comm = NoComm;
    assert!(comm.is_no_comm());
    assert_eq!((comm.rank(), comm.size()), (0, 1));
    let mut buf = [0u8; 8];
    assert!(comm.irecv(0, 123, &mut buf).wait().is_none());
    assert!(comm.isend(0, 123, &[]).wait().is_none());
}

#[test]
fn rayon_fifo_order() {
    let w = RayonComm::world(2);
    let tag = CommTag::new(0x1001);
    for i in 0..10u8 {
        w[0].isend(1, tag.as_u16(), &[i]);
    }
    let out: Vec<u8> = (0..10)
        .map(|_| {
            let mut b = [0u8; 1];
            w[1].irecv(0, tag.as_u16(), &mut b).wait().unwrap()[0]
        })
        .collect();
    assert_eq!(out, (0u8..10).collect::<Vec<_>>());
}

#[test]
fn rayon_truncates_to_receive_buffer() {
    let w = RayonComm::world(2);
    w[0].isend(1, 7, &[1, 2, 3, 4, 5, 6]);
    let mut b = [0u8; 4];
    assert_eq!(w[1].irecv(0, 7, &mut b).wait().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn tags_do_not_cross() {
    let w = RayonComm::world(2);
    const TAG_A: u16 = 0xA100;
    const TAG_B: u16 = 0xB200;
    let a = [WireU64 { x: 0xDEAD_BEEF }];
    let b = [WireU64 { x: 0x0123_4567 }];
    w[0].isend(1, TAG_B, cast_slice(&b));
    w[0].isend(1, TAG_A, cast_slice(&a));
    let mut buf = [0u8; 8];
    let got_a = w[1].irecv(0, TAG_A, &mut buf).wait().unwrap();
    let got_b = w[1].irecv(0, TAG_B, &mut buf).wait().unwrap();
    assert_eq!(bytemuck::pod_read_unaligned::<WireU64>(&got_a), a[0]);
    assert_eq!(bytemuck::pod_read_unaligned::<WireU64>(&got_b), b[0]);
}

#[test]
fn all_gather_matches_on_every_rank() {
    for p in rank_counts() {
        let out = run_ranks(p, |c| {
            let mine: Vec<WireU64> = (0..c.rank() as u64).map(|x| WireU64 { x }).collect();
            all_gather_pod(&c, CommTag::new(0x2000), &mine).unwrap()
        });
        for per_rank in &out {
            assert_eq!(per_rank, &out[0]);
            for (r, items) in per_rank.iter().enumerate() {
                assert_eq!(items.len(), r);
            }
        }
    }
}

#[test]
fn all_to_all_delivers_personalised_payloads() {
    let out = run_ranks(3, |c| {
        let sends: Vec<Vec<u64>> = (0..c.size())
            .map(|dst| vec![(c.rank() * 10 + dst) as u64; dst])
            .collect();
        all_to_all_pod(&c, CommTag::new(0x2100), &sends).unwrap()
    });
    for (me, recvd) in out.iter().enumerate() {
        for (src, items) in recvd.iter().enumerate() {
            assert_eq!(items, &vec![(src * 10 + me) as u64; me]);
        }
    }
}

#[test]
fn gather_fills_root_only() {
    let out = run_ranks(4, |c| {
        gather_pod(&c, CommTag::new(0x2200), 2, &[c.rank() as f64]).unwrap()
    });
    for (r, got) in out.iter().enumerate() {
        if r == 2 {
            assert_eq!(got.concat(), vec![0.0, 1.0, 2.0, 3.0]);
        } else {
            assert!(got.is_empty());
        }
    }
}

#[test]
fn reductions_and_barrier() {
    let out = run_ranks(4, |c| {
        c.barrier(CommTag::new(0x2300)).unwrap();
        let x = c.rank() as f64 - 1.5;
        (
            all_reduce_f64(&c, CommTag::new(0x2310), x, ReduceOp::Sum).unwrap(),
            all_reduce_f64(&c, CommTag::new(0x2310), x, ReduceOp::Min).unwrap(),
            all_reduce_f64(&c, CommTag::new(0x2310), x, ReduceOp::Max).unwrap(),
        )
    });
    assert!(out.iter().all(|&r| r == (0.0, -1.5, 1.5)));
}

#[test]
fn serial_collectives_return_own_contribution() {
    let got = all_gather_pod(&NoComm, CommTag::new(0x2400), &[5u64, 6]).unwrap();
    assert_eq!(got, vec![vec![5, 6]]);
    NoComm.barrier(CommTag::new(0x2410)).unwrap();
}
