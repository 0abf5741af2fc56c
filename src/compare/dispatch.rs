use std::io::Write;

use crate::compare::aggregate::{AggregateStatistics, ResultAggregator};
use crate::compare::worker::SequenceWorker;
use crate::error::{DiffError, Result};
use crate::io::SeqRecord;

/// 把输入序列分发给 worker，输出汇入同一个 aggregator。
///
/// - 单线程时全部在调用线程上执行，不创建线程。
/// - 否则由 `threads` 个线程的 rayon 线程池按轮处理，每轮读入 `threads * batch_size`
///   条记录，每个 worker 取其中连续的一块。
/// - 各 worker 的统计在最后一轮结束并汇合之后才合并。
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    threads: usize,
    batch_size: usize,
}

/// 一个 worker 及其私有计数与遇到的第一个错误
struct Slot<P> {
    worker: P,
    stats: AggregateStatistics,
    error: Option<DiffError>,
}

impl<P: SequenceWorker> Slot<P> {
    fn new(worker: P) -> Self {
        Self { worker, stats: AggregateStatistics::default(), error: None }
    }

    fn run<W: Write + Send>(&mut self, chunk: &[SeqRecord], aggregator: &ResultAggregator<W>) {
        for rec in chunk {
            if self.error.is_some() {
                return;
            }
            let res = self.worker.process(&rec.seq).and_then(|out| {
                for b in &out.bubbles {
                    aggregator.emit(b)?;
                }
                Ok(out.stats)
            });
            match res {
                Ok(delta) => self.stats += delta,
                Err(e) => self.error = Some(e),
            }
        }
    }
}

impl Dispatcher {
    pub fn new(threads: usize, batch_size: usize) -> Self {
        Self { threads: threads.max(1), batch_size: batch_size.max(1) }
    }

    pub fn run<I, F, P, W>(&self, input: I, factory: F, aggregator: &ResultAggregator<W>) -> Result<()>
    where
        I: IntoIterator<Item = Result<SeqRecord>>,
        F: Fn() -> P,
        P: SequenceWorker,
        W: Write + Send,
    {
        if self.threads == 1 {
            log::info!("processing serially");
            return self.run_serial(input, factory(), aggregator);
        }
        log::info!("processing with {} worker threads, {} reads per batch", self.threads, self.batch_size);
        self.run_parallel(input, factory, aggregator)
    }

    fn run_serial<I, P, W>(&self, input: I, worker: P, aggregator: &ResultAggregator<W>) -> Result<()>
    where
        I: IntoIterator<Item = Result<SeqRecord>>,
        P: SequenceWorker,
        W: Write + Send,
    {
        let mut slot = Slot::new(worker);
        for rec in input {
            let rec = rec?;
            if rec.seq.is_empty() {
                log::warn!("skipping empty sequence '{}'", rec.id);
                continue;
            }
            slot.run(std::slice::from_ref(&rec), aggregator);
            if let Some(e) = slot.error.take() {
                return Err(e);
            }
        }
        aggregator.merge_stats(slot.stats);
        Ok(())
    }

    fn run_parallel<I, F, P, W>(&self, input: I, factory: F, aggregator: &ResultAggregator<W>) -> Result<()>
    where
        I: IntoIterator<Item = Result<SeqRecord>>,
        F: Fn() -> P,
        P: SequenceWorker,
        W: Write + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| DiffError::Configuration(format!("cannot start worker threads: {}", e)))?;

        let mut slots: Vec<Slot<P>> = (0..self.threads).map(|_| Slot::new(factory())).collect();
        let round = self.threads * self.batch_size;
        let mut input = input.into_iter();
        let mut batch: Vec<SeqRecord> = Vec::with_capacity(round);
        let mut rounds = 0usize;

        loop {
            batch.clear();
            for rec in (&mut input).take(round) {
                let rec = rec?;
                if rec.seq.is_empty() {
                    log::warn!("skipping empty sequence '{}'", rec.id);
                    continue;
                }
                batch.push(rec);
            }
            if batch.is_empty() {
                break;
            }
            rounds += 1;

            let chunk_len = (batch.len() + self.threads - 1) / self.threads;
            pool.scope(|s| {
                for (slot, chunk) in slots.iter_mut().zip(batch.chunks(chunk_len)) {
                    s.spawn(move |_| slot.run(chunk, aggregator));
                }
            });

            if let Some(e) = slots.iter_mut().find_map(|s| s.error.take()) {
                return Err(e);
            }
        }

        log::debug!("dispatched {} rounds", rounds);
        for slot in slots {
            aggregator.merge_stats(slot.stats);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::walk::Bubble;
    use crate::compare::worker::WorkOutput;

    /// Emits one bubble per read that starts with 'A'; counts every read.
    struct EchoWorker;

    impl SequenceWorker for EchoWorker {
        fn process(&mut self, seq: &[u8]) -> Result<WorkOutput> {
            let mut out = WorkOutput::default();
            out.stats.sequences = 1;
            out.stats.kmers_examined = seq.len() as u64;
            if seq[0] == b'A' {
                out.stats.bubbles = 1;
                out.bubbles.push(Bubble {
                    sequence: crate::util::dna::encode(seq),
                    anchor_len: 1,
                    left_support: 1,
                    right_support: 1,
                    reference: None,
                });
            }
            Ok(out)
        }
    }

    struct FailingWorker;

    impl SequenceWorker for FailingWorker {
        fn process(&mut self, seq: &[u8]) -> Result<WorkOutput> {
            if seq == b"BAD" {
                return Err(DiffError::IndexCorrupt("test".into()));
            }
            Ok(WorkOutput::default())
        }
    }

    fn reads(n: usize) -> Vec<Result<SeqRecord>> {
        (0..n)
            .map(|i| {
                let seq = if i % 3 == 0 { b"ACGT".to_vec() } else { b"CCGTA".to_vec() };
                Ok(SeqRecord { id: format!("r{}", i), seq })
            })
            .collect()
    }

    fn run(threads: usize, batch: usize, n: usize) -> (AggregateStatistics, Vec<String>) {
        let agg = ResultAggregator::new(Vec::new());
        Dispatcher::new(threads, batch).run(reads(n), || EchoWorker, &agg).unwrap();
        let stats = agg.report();
        let text = String::from_utf8(agg.finish().unwrap()).unwrap();
        let mut seqs: Vec<String> = text.lines().filter(|l| !l.starts_with('>')).map(String::from).collect();
        seqs.sort();
        (stats, seqs)
    }

    #[test]
    fn serial_and_parallel_agree() {
        let (serial, serial_out) = run(1, 4, 101);
        assert_eq!(serial.sequences, 101);
        assert_eq!(serial.bubbles, 34);
        for (threads, batch) in [(2, 1), (3, 7), (4, 1000)] {
            let (stats, out) = run(threads, batch, 101);
            assert_eq!(stats, serial, "threads={} batch={}", threads, batch);
            assert_eq!(out, serial_out);
        }
    }

    #[test]
    fn empty_reads_are_skipped() {
        let agg = ResultAggregator::new(std::io::sink());
        let input = vec![
            Ok(SeqRecord { id: "e".into(), seq: Vec::new() }),
            Ok(SeqRecord { id: "a".into(), seq: b"ACG".to_vec() }),
        ];
        Dispatcher::new(2, 1).run(input, || EchoWorker, &agg).unwrap();
        assert_eq!(agg.report().sequences, 1);
    }

    #[test]
    fn worker_errors_abort_the_run() {
        for threads in [1, 3] {
            let agg = ResultAggregator::new(std::io::sink());
            let mut input = reads(10);
            input.push(Ok(SeqRecord { id: "bad".into(), seq: b"BAD".to_vec() }));
            let err = Dispatcher::new(threads, 2).run(input, || FailingWorker, &agg).unwrap_err();
            assert!(matches!(err, DiffError::IndexCorrupt(_)));
        }
    }

    #[test]
    fn input_errors_propagate() {
        let agg = ResultAggregator::new(std::io::sink());
        let input = vec![Err(DiffError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "x")))];
        assert!(Dispatcher::new(1, 1).run(input, || EchoWorker, &agg).is_err());
    }
}
