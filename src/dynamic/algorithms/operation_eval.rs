use rayon::{iter::{IndexedParallelIterator, ParallelIterator}, slice::{ParallelSlice, ParallelSliceMut}};

use crate::{dynamic::algorithms::affected_basis_functions::AffectedBasis, errors::SGError};

///
/// Evaluates the sparse grid function `sum(alpha[seq] * phi_seq(x))` through an
/// affected-basis lookup.
///
pub struct OperationEval<A: AffectedBasis>
{
    lookup: A,
}

impl<A: AffectedBasis> OperationEval<A>
{
    pub fn new(lookup: A) -> Self
    {
        Self { lookup }
    }

    pub fn lookup(&self) -> &A
    {
        &self.lookup
    }

    fn check_alpha(&self, alpha: &[f64]) -> Result<(), SGError>
    {
        let len = self.lookup.storage().len();
        if alpha.len() != len
        {
            return Err(SGError::DimensionMismatch { expected: len, found: alpha.len() });
        }
        Ok(())
    }

    #[inline]
    fn eval_with_buffer(&self, alpha: &[f64], x: &[f64], buffer: &mut Vec<(usize, f64)>) -> Result<f64, SGError>
    {
        self.lookup.get(x, buffer)?;
        Ok(buffer.iter().map(|&(seq, value)| alpha[seq] * value).sum())
    }

    pub fn eval(&self, alpha: &[f64], x: &[f64]) -> Result<f64, SGError>
    {
        self.check_alpha(alpha)?;
        self.eval_with_buffer(alpha, x, &mut Vec::new())
    }

    ///
    /// Evaluates many points stored row-major in `x`. Each rayon worker keeps its
    /// own lookup buffer; the storage is shared read-only.
    ///
    pub fn eval_batch(&self, alpha: &[f64], x: &[f64]) -> Result<Vec<f64>, SGError>
    {
        self.check_alpha(alpha)?;
        let num_inputs = self.lookup.storage().num_inputs();
        if num_inputs == 0 || x.len() % num_inputs != 0
        {
            return Err(SGError::DimensionMismatch { expected: num_inputs, found: x.len() });
        }
        let mut results = vec![0.0; x.len() / num_inputs];
        x.par_chunks_exact(num_inputs).zip(results.par_chunks_exact_mut(1)).try_for_each_init(Vec::new,
            |buffer, (x, y)|
            {
                y[0] = self.eval_with_buffer(alpha, x, buffer)?;
                Ok(())
            }
        )?;
        Ok(results)
    }
}
